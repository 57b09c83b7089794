use log::warn;

use crate::source::OsmElementRef;

/// Top two bits encode the element kind: 00=node, 01=way, 10=relation. The remaining 62 bits carry the raw ID.
const WAY_ID_PREFIX: u64 = 1 << 62;
const REL_ID_PREFIX: u64 = 1 << 63;
const TYPE_ID_MASK: u64 = (1 << 62) - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum OsmElementKind {
    Node,
    Way,
    Relation,
}

/// Pack a raw OSM id and its kind into one key; negative or oversized ids are skipped.
pub(super) fn encode_element_id(kind: OsmElementKind, raw_id: i64) -> Option<u64> {
    let Ok(base) = u64::try_from(raw_id) else {
        warn!("Skipped OSM element: kind={kind:?}, raw_id={raw_id} (negative identifiers are unsupported)");
        return None;
    };
    if base > TYPE_ID_MASK {
        warn!(
            "Skipped OSM element: kind={kind:?}, raw_id={raw_id} (exceeds supported maximum {TYPE_ID_MASK})"
        );
        return None;
    }
    let prefix = match kind {
        OsmElementKind::Node => 0,
        OsmElementKind::Way => WAY_ID_PREFIX,
        OsmElementKind::Relation => REL_ID_PREFIX,
    };
    Some(prefix | base)
}

/// Recover the element reference from an encoded key.
pub(super) fn decode_element_id(encoded: u64) -> OsmElementRef {
    let raw = i64::try_from(encoded & TYPE_ID_MASK).unwrap_or(i64::MAX);
    if encoded & REL_ID_PREFIX != 0 {
        OsmElementRef::Relation(raw)
    } else if encoded & WAY_ID_PREFIX != 0 {
        OsmElementRef::Way(raw)
    } else {
        OsmElementRef::Node(raw)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(OsmElementKind::Node, 42, OsmElementRef::Node(42))]
    #[case(OsmElementKind::Way, 42, OsmElementRef::Way(42))]
    #[case(OsmElementKind::Relation, 7, OsmElementRef::Relation(7))]
    fn kinds_do_not_collide(
        #[case] kind: OsmElementKind,
        #[case] raw: i64,
        #[case] expected: OsmElementRef,
    ) {
        let encoded = encode_element_id(kind, raw).expect("id in range");

        assert_eq!(decode_element_id(encoded), expected);
    }

    #[rstest]
    #[case(-1)]
    #[case(i64::MAX)]
    fn rejects_unsupported_ids(#[case] raw: i64) {
        assert_eq!(encode_element_id(OsmElementKind::Node, raw), None);
    }
}
