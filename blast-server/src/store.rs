use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Tree};

pub const USERS: &str = "users";
pub const FRIEND_REQUESTS: &str = "friendRequests";
pub const BLASTS: &str = "blasts";

pub type TxResult<T> = ConflictableTransactionResult<T, anyhow::Error>;

/// Document store over sled: one tree per collection, documents are JSON
/// blobs keyed by id. Multi-document writes go through sled transactions
/// so a friend accept or a blast fan-out commits all-or-nothing.
#[derive(Clone)]
pub struct DocStore {
    db: Db,
}

impl DocStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        Ok(Self { db: sled::open(path)? })
    }

    pub fn temporary() -> anyhow::Result<Self> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    pub fn tree(&self, collection: &str) -> anyhow::Result<Tree> {
        Ok(self.db.open_tree(collection)?)
    }

    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> anyhow::Result<Option<T>> {
        match self.tree(collection)?.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Like `get`, but a missing document is an error.
    pub fn fetch<T: DeserializeOwned>(&self, collection: &str, id: &str) -> anyhow::Result<T> {
        self.get(collection, id)?
            .with_context(|| format!("document {collection}/{id} not found"))
    }

    pub fn set<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> anyhow::Result<()> {
        self.tree(collection)?
            .insert(id.as_bytes(), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    pub fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        self.tree(collection)?.remove(id.as_bytes())?;
        Ok(())
    }

    /// Atomic read-modify-write of a single document. The closure may run
    /// more than once if the transaction retries.
    pub fn update<T>(&self, collection: &str, id: &str, func: impl Fn(&mut T)) -> anyhow::Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let tree = self.tree(collection)?;
        unwrap_tx(tree.transaction(|tx| {
            let mut doc: T = tx_fetch(tx, collection, id)?;
            func(&mut doc);
            tx_set(tx, id, &doc)
        }))
    }

    /// Full-collection scan with a predicate, the moral equivalent of a
    /// field-equality query. Collections here are small enough that no
    /// index is worth its keep.
    pub fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: impl Fn(&T) -> bool,
    ) -> anyhow::Result<Vec<T>> {
        let mut out = Vec::new();
        for entry in self.tree(collection)?.iter() {
            let (_, raw) = entry?;
            let doc: T = serde_json::from_slice(&raw)?;
            if filter(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

pub fn abort(err: impl Into<anyhow::Error>) -> ConflictableTransactionError<anyhow::Error> {
    ConflictableTransactionError::Abort(err.into())
}

pub fn unwrap_tx<T>(
    res: Result<T, TransactionError<anyhow::Error>>,
) -> anyhow::Result<T> {
    match res {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(err.into()),
    }
}

pub fn tx_get<T: DeserializeOwned>(tree: &TransactionalTree, id: &str) -> TxResult<Option<T>> {
    match tree.get(id.as_bytes())? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw).map_err(abort)?)),
        None => Ok(None),
    }
}

pub fn tx_fetch<T: DeserializeOwned>(
    tree: &TransactionalTree,
    collection: &str,
    id: &str,
) -> TxResult<T> {
    tx_get(tree, id)?.ok_or_else(|| abort(anyhow!("document {collection}/{id} not found")))
}

pub fn tx_set<T: Serialize>(tree: &TransactionalTree, id: &str, doc: &T) -> TxResult<()> {
    tree.insert(id.as_bytes(), serde_json::to_vec(doc).map_err(abort)?)?;
    Ok(())
}

pub fn tx_delete(tree: &TransactionalTree, id: &str) -> TxResult<()> {
    tree.remove(id.as_bytes())?;
    Ok(())
}
