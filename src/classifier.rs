//! Parses a Stellar deposit memo into a routing decision.
//!
//! `spec.md` §4.4: a text memo must be `<kind>_<id>` with exactly one
//! underscore; `kind` resolves to a chain-L1 account via one of the four
//! identity lookups. Anything else forces the refund path.

use crate::{error::BridgeError, subclient::SubClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoKind {
    Twin(u64),
    Farm(u64),
    Node(u64),
    Entity(u64),
}

/// Splits `text` into a routing kind, or a `MalformedMemo` error that the
/// caller should treat as "force refund", not as fatal.
pub fn parse_memo(text: &str) -> Result<MemoKind, BridgeError> {
    let mut parts = text.splitn(2, '_');
    let kind = parts.next().filter(|s| !s.is_empty());
    let id = parts.next().filter(|s| !s.is_empty());

    let (kind, id) = match (kind, id) {
        (Some(kind), Some(id)) => (kind, id),
        _ => return Err(BridgeError::MalformedMemo(text.to_string())),
    };

    // Reject a second underscore: the spec requires exactly one.
    if id.contains('_') {
        return Err(BridgeError::MalformedMemo(text.to_string()));
    }

    let numeric_id: u64 = id.parse().map_err(|_| BridgeError::MalformedMemo(text.to_string()))?;

    match kind {
        "twin" => Ok(MemoKind::Twin(numeric_id)),
        "farm" => Ok(MemoKind::Farm(numeric_id)),
        "node" => Ok(MemoKind::Node(numeric_id)),
        "entity" => Ok(MemoKind::Entity(numeric_id)),
        _ => Err(BridgeError::MalformedMemo(text.to_string())),
    }
}

/// Resolves a parsed memo kind to a chain-L1 account address.
pub async fn resolve_account(subclient: &dyn SubClient, kind: &MemoKind) -> crate::error::Result<String> {
    match kind {
        MemoKind::Twin(id) => Ok(subclient.get_twin(*id).await?.account),
        MemoKind::Farm(id) => {
            let farm = subclient.get_farm(*id).await?;
            Ok(subclient.get_twin(farm.twin_id).await?.account)
        }
        MemoKind::Node(id) => {
            let node = subclient.get_node(*id).await?;
            Ok(subclient.get_twin(node.twin_id).await?.account)
        }
        MemoKind::Entity(id) => Ok(subclient.get_entity(*id).await?.account),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_memos() {
        assert_eq!(parse_memo("twin_42").unwrap(), MemoKind::Twin(42));
        assert_eq!(parse_memo("farm_7").unwrap(), MemoKind::Farm(7));
        assert_eq!(parse_memo("node_3").unwrap(), MemoKind::Node(3));
        assert_eq!(parse_memo("entity_1").unwrap(), MemoKind::Entity(1));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(parse_memo("hello world").is_err());
    }

    #[test]
    fn rejects_non_numeric_id() {
        assert!(parse_memo("twin_abc").is_err());
    }

    #[test]
    fn rejects_multiple_underscores() {
        assert!(parse_memo("twin_4_2").is_err());
    }

    #[test]
    fn rejects_empty_memo() {
        assert!(parse_memo("").is_err());
    }
}
