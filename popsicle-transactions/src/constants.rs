/// Flat minimum ADA attached to any output that carries a native asset.
///
/// The ledger computes the real value from the output size; this floor is large
/// enough for single-asset outputs.
pub const MIN_ADA: u64 = 1_400_000;

/// Placeholder fee used for the first draft of a mint.
pub const MINT_FEE_FLOOR: u64 = 300_000;

/// Slots added to the current tip to derive an NFT policy's time lock.
pub const NFT_SLOT_HORIZON: u64 = 10_000;

/// NFTs are minted one at a time.
pub const NFT_QUANTITY: u64 = 1;

/// Transaction metadata label for NFT attributes.
pub const NFT_METADATA_LABEL: &str = "721";

/// Network magic of the public testnet.
pub const TESTNET_MAGIC: u32 = 1_097_911_063;
