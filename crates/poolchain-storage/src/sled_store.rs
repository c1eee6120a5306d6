use anyhow::{Context, Result};
use poolchain_core::{Block, ChainStore};
use sled::{Db, IVec, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";
const KEY_TIP_HASH: &[u8] = b"tip_hash";

/// Blocks are bincode-encoded under their big-endian index, so iteration order
/// matches chain order. The tip is tracked under two fixed keys in the default tree.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let db = sled::open(path).with_context(|| format!("opening sled db at {}", path.display()))?;
    let blocks = db.open_tree(TREE_BLOCKS).context("opening blocks tree")?;
    info!(path = %path.display(), "sled store opened");
    Ok(Self { db, blocks })
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  /// Removes every block and the tip markers.
  pub fn clear(&self) -> Result<()> {
    self.blocks.clear()?;
    self.db.remove(KEY_TIP_HEIGHT)?;
    self.db.remove(KEY_TIP_HASH)?;
    self.db.flush()?;
    Ok(())
  }
}

impl ChainStore for SledStore {
  fn put_block(&self, block: &Block, hash: &str) -> Result<()> {
    let key = block.index().to_be_bytes();
    let bytes = bincode::serialize(block).context("encoding block")?;
    self.blocks.insert(key, bytes)?;

    // update tip
    self.db.insert(KEY_TIP_HEIGHT, &block.index().to_be_bytes())?;
    self.db.insert(KEY_TIP_HASH, hash.as_bytes())?;

    self.db.flush()?;
    debug!(index = block.index(), "block stored");
    Ok(())
  }

  fn get_block(&self, index: u64) -> Result<Option<Block>> {
    let key = index.to_be_bytes();
    self
      .blocks
      .get(key)?
      .map(|ivec: IVec| bincode::deserialize(&ivec).with_context(|| format!("decoding block {index}")))
      .transpose()
  }

  fn tip_height(&self) -> Result<u64> {
    match self.db.get(KEY_TIP_HEIGHT)? {
      Some(v) => {
        let arr = <[u8; 8]>::try_from(&v[..]).context("corrupt tip height")?;
        Ok(u64::from_be_bytes(arr))
      }
      None => Ok(0),
    }
  }

  fn tip_hash(&self) -> Result<Option<String>> {
    self
      .db
      .get(KEY_TIP_HASH)?
      .map(|v| String::from_utf8(v.to_vec()).context("corrupt tip hash"))
      .transpose()
  }
}
