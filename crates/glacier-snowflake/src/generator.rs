use crate::{clock::Clock, error::Error, Snowflake, SnowflakeId};

/// Trait for generating unique identifiers.
///
/// Lets callers such as the CLI stay generic over the clock a generator
/// runs on.
pub trait IdGenerator: Send + Sync + 'static {
    type Output: Into<u64> + Copy;
    /// Generates the next identifier, or reports why none could be issued.
    fn generate(&self) -> Result<Self::Output, Error>;
}

impl<C: Clock + 'static> IdGenerator for Snowflake<C> {
    type Output = SnowflakeId;

    fn generate(&self) -> Result<Self::Output, Error> {
        self.next_id()
    }
}
