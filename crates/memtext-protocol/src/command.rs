//! Parsed commands and their execution against `Storage`.
//!
//! Vocabulary is a representative subset of the real memcached text
//! protocol (spec.md §1 scopes the full grammar out): `get`, `set`,
//! `add`, `replace`, `delete`. `flags`/`exptime` are parsed — so a real
//! memcached client library can talk to this server without a
//! protocol-dialect patch — but otherwise inert, per the TTL/CAS
//! non-goals (SPEC_FULL.md §1).

use cache_core::Storage;

/// A fully-parsed command header, plus (for bulk-argument commands)
/// the number of argument bytes the caller must still read from the
/// stream before `execute` can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        key: String,
    },
    Set {
        key: String,
        flags: u32,
        exptime: i64,
        bytes: usize,
    },
    Add {
        key: String,
        flags: u32,
        exptime: i64,
        bytes: usize,
    },
    Replace {
        key: String,
        flags: u32,
        exptime: i64,
        bytes: usize,
    },
    Delete {
        key: String,
    },
}

impl Command {
    /// Bytes of bulk argument this command's header declared. Zero for
    /// `get`/`delete`, which carry no body.
    pub fn arg_bytes(&self) -> usize {
        match self {
            Command::Set { bytes, .. } | Command::Add { bytes, .. } | Command::Replace { bytes, .. } => *bytes,
            Command::Get { .. } | Command::Delete { .. } => 0,
        }
    }

    /// Run the command against `storage`, consuming the already-framed
    /// bulk argument (CRLF already stripped by the caller), and return
    /// the textual reply body (without trailing `\r\n` — the connection
    /// state machine appends that once, per spec §4.5).
    pub fn execute(&self, storage: &dyn Storage, argument: &[u8]) -> Vec<u8> {
        match self {
            Command::Get { key } => {
                let mut out = Vec::new();
                if storage.get(key, &mut out) {
                    let mut reply = format!("VALUE {key} 0 {}\r\n", out.len()).into_bytes();
                    reply.extend_from_slice(&out);
                    reply.extend_from_slice(b"\r\nEND");
                    reply
                } else {
                    b"END".to_vec()
                }
            }
            Command::Set { key, .. } => {
                if storage.put(key, argument) {
                    b"STORED".to_vec()
                } else {
                    b"SERVER_ERROR object too large for cache".to_vec()
                }
            }
            Command::Add { key, .. } => {
                if storage.put_if_absent(key, argument) {
                    b"STORED".to_vec()
                } else {
                    b"NOT_STORED".to_vec()
                }
            }
            Command::Replace { key, .. } => {
                if storage.set(key, argument) {
                    b"STORED".to_vec()
                } else {
                    b"NOT_STORED".to_vec()
                }
            }
            Command::Delete { key } => {
                if storage.delete(key) {
                    b"DELETED".to_vec()
                } else {
                    b"NOT_FOUND".to_vec()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_core::LockingCache;

    #[test]
    fn get_hit_formats_value_reply() {
        let storage = LockingCache::new(1024);
        storage.put("foo", b"bar");
        let reply = Command::Get { key: "foo".into() }.execute(&storage, b"");
        assert_eq!(reply, b"VALUE foo 0 3\r\nbar\r\nEND");
    }

    #[test]
    fn get_miss_is_end() {
        let storage = LockingCache::new(1024);
        let reply = Command::Get { key: "missing".into() }.execute(&storage, b"");
        assert_eq!(reply, b"END");
    }

    #[test]
    fn set_then_delete() {
        let storage = LockingCache::new(1024);
        let set = Command::Set {
            key: "k".into(),
            flags: 0,
            exptime: 0,
            bytes: 3,
        };
        assert_eq!(set.execute(&storage, b"bar"), b"STORED");
        let del = Command::Delete { key: "k".into() };
        assert_eq!(del.execute(&storage, b""), b"DELETED");
        assert_eq!(del.execute(&storage, b""), b"NOT_FOUND");
    }

    #[test]
    fn add_fails_on_existing_key() {
        let storage = LockingCache::new(1024);
        storage.put("k", b"v");
        let add = Command::Add {
            key: "k".into(),
            flags: 0,
            exptime: 0,
            bytes: 1,
        };
        assert_eq!(add.execute(&storage, b"x"), b"NOT_STORED");
    }

    #[test]
    fn replace_fails_on_missing_key() {
        let storage = LockingCache::new(1024);
        let replace = Command::Replace {
            key: "missing".into(),
            flags: 0,
            exptime: 0,
            bytes: 1,
        };
        assert_eq!(replace.execute(&storage, b"x"), b"NOT_STORED");
    }
}
