//! Memoized round-number accessor.
//!
//! Preparing several transactions in one pass (a burn chunk, a multi-unit
//! send) needs a timeout for each of them. The round only has to be fresh
//! enough, so it is fetched once and reused for the rest of the pass.

use tokio::sync::OnceCell;

use crate::rpc::{PartitionClient, RpcClientError};

pub struct CachedRoundNumber<'a> {
    client: &'a dyn PartitionClient,
    round: OnceCell<u64>,
}

impl<'a> CachedRoundNumber<'a> {
    pub fn new(client: &'a dyn PartitionClient) -> Self {
        Self {
            client,
            round: OnceCell::new(),
        }
    }

    /// Round number, fetched on first use.
    pub async fn get(&self) -> Result<u64, RpcClientError> {
        self.round
            .get_or_try_init(|| self.client.get_round_number())
            .await
            .copied()
    }

    /// Timeout `rounds` rounds past the cached round.
    pub async fn timeout_after(&self, rounds: u64) -> Result<u64, RpcClientError> {
        Ok(self.get().await?.saturating_add(rounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::InMemoryPartition;

    #[tokio::test]
    async fn fetches_once() {
        let partition = InMemoryPartition::new();
        partition.set_round(40);
        let cached = CachedRoundNumber::new(&partition);

        assert_eq!(cached.get().await.unwrap(), 40);
        assert_eq!(cached.get().await.unwrap(), 40);
        // Auto-advance only moved once.
        assert_eq!(partition.round(), 41);
        assert_eq!(cached.timeout_after(10).await.unwrap(), 50);
    }
}
