use crate::{ComicId, Entry, EntryUniverse};
use parking_lot::Mutex;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
    #[error("entry codec: {0}")]
    Codec(#[from] bincode::Error),
    #[error("malformed key of {0} bytes")]
    MalformedKey(usize),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable id -> entry persistence.
///
/// Implementations are assumed to have a single writer at a time.
pub trait Store: Send + Sync {
    /// Everything persisted so far; an empty universe on first run.
    fn read(&self) -> Result<EntryUniverse, StoreError>;

    /// Merge entries into the persisted state by id.
    fn write(&self, entries: &EntryUniverse) -> Result<(), StoreError>;

    fn write_one(&self, id: ComicId, entry: &Entry) -> Result<(), StoreError> {
        self.write(&EntryUniverse::from([(id, entry.clone())]))
    }
}

/// sled-backed store: big-endian id keys, bincode entry values.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

fn decode_key(key: &[u8]) -> Result<ComicId, StoreError> {
    let bytes: [u8; 4] = key.try_into().map_err(|_| StoreError::MalformedKey(key.len()))?;
    Ok(ComicId::from_be_bytes(bytes))
}

impl Store for SledStore {
    fn read(&self) -> Result<EntryUniverse, StoreError> {
        let mut entries = EntryUniverse::with_capacity(self.db.len());
        for kv in self.db.iter() {
            let (key, value) = kv?;
            let entry: Entry = bincode::deserialize(&value)?;
            entries.insert(decode_key(&key)?, entry);
        }
        Ok(entries)
    }

    fn write(&self, entries: &EntryUniverse) -> Result<(), StoreError> {
        for (id, entry) in entries {
            let bytes = bincode::serialize(entry)?;
            self.db.insert(id.to_be_bytes(), bytes)?;
        }
        self.db.flush()?;
        Ok(())
    }
}

/// In-process store, optionally refusing writes.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<EntryUniverse>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_entries(entries: EntryUniverse) -> Self {
        Self { entries: Mutex::new(entries), fail_writes: false }
    }

    pub fn failing_writes() -> Self {
        Self { entries: Mutex::default(), fail_writes: true }
    }

    pub fn snapshot(&self) -> EntryUniverse { self.entries.lock().clone() }
}

impl Store for MemoryStore {
    fn read(&self) -> Result<EntryUniverse, StoreError> { Ok(self.snapshot()) }

    fn write(&self, entries: &EntryUniverse) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        let mut current = self.entries.lock();
        current.extend(entries.iter().map(|(id, e)| (*id, e.clone())));
        Ok(())
    }
}
