//! Native minting-policy scripts in the JSON form accepted by `cardano-cli`.

use serde::{Deserialize, Serialize};

/// The two script shapes this bridge issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyScript {
    /// Mint and burn whenever the key signs.
    Signature { key_hash: String },
    /// Mint only before `before_slot`, and only with the key's signature.
    TimeLocked { before_slot: u64, key_hash: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ScriptJson {
    Sig {
        #[serde(rename = "keyHash")]
        key_hash: String,
    },
    Before {
        slot: u64,
    },
    All {
        scripts: Vec<ScriptJson>,
    },
}

impl PolicyScript {
    pub fn before_slot(&self) -> Option<u64> {
        match self {
            PolicyScript::Signature { .. } => None,
            PolicyScript::TimeLocked { before_slot, .. } => Some(*before_slot),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let script = match self {
            PolicyScript::Signature { key_hash } => ScriptJson::Sig {
                key_hash: key_hash.clone(),
            },
            PolicyScript::TimeLocked { before_slot, key_hash } => ScriptJson::All {
                scripts: vec![
                    ScriptJson::Before { slot: *before_slot },
                    ScriptJson::Sig {
                        key_hash: key_hash.clone(),
                    },
                ],
            },
        };
        // Serializing a derived enum of strings and integers cannot fail.
        serde_json::to_value(script).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        let value = self.to_json();
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }

    /// Reads back a script written by [`PolicyScript::to_json`]. Scripts of any
    /// other shape yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let script: ScriptJson = serde_json::from_value(value.clone()).ok()?;
        match script {
            ScriptJson::Sig { key_hash } => Some(PolicyScript::Signature { key_hash }),
            ScriptJson::All { scripts } => {
                let mut before_slot = None;
                let mut key_hash = None;
                for s in scripts {
                    match s {
                        ScriptJson::Before { slot } if before_slot.is_none() => before_slot = Some(slot),
                        ScriptJson::Sig { key_hash: k } if key_hash.is_none() => key_hash = Some(k),
                        _ => return None,
                    }
                }
                Some(PolicyScript::TimeLocked {
                    before_slot: before_slot?,
                    key_hash: key_hash?,
                })
            }
            ScriptJson::Before { .. } => None,
        }
    }
}
