//! The dual lookup engine: UTC instant to local type, and local (wall
//! clock) reading plus fold to a single local type.

use crate::builder::{BuiltZone, TypeRecord};

/// Resolve the local time type in effect at a UTC instant.
pub fn type_for_utc(zone: &BuiltZone, seconds: i64) -> TypeRecord {
    let last = zone.trans_utc.len();
    match zone.trans_utc.binary_search(&seconds) {
        Ok(idx) if idx + 1 == last => type_at_or_past_last(zone, seconds),
        Ok(idx) => type_at(zone, idx),
        Err(0) => zone.type_before.clone(),
        Err(idx) if idx == last => type_at_or_past_last(zone, seconds),
        Err(idx) => type_at(zone, idx - 1),
    }
}

/// `t ≥ trans_utc[N-1]`: consult the tail rule if there is one, else
/// fall back to the last recorded type.
fn type_at_or_past_last(zone: &BuiltZone, seconds: i64) -> TypeRecord {
    match &zone.tail_rule {
        Some(rule) => rule.type_at_utc(seconds),
        None => type_at(zone, zone.trans_utc.len() - 1),
    }
}

/// Resolve the local time type for a wall-clock reading, disambiguating
/// a gap or an overlap by `fold` (`0` = earlier/pre-transition side,
/// `1` = later/post-transition side).
pub fn resolve_local(zone: &BuiltZone, local_seconds: i64, fold: u8) -> TypeRecord {
    if zone.trans_utc.is_empty() {
        return match &zone.tail_rule {
            Some(rule) => rule.resolve_local(local_seconds, fold),
            None => zone.type_before.clone(),
        };
    }

    let lo = &zone.trans_wall[1];
    let hi = &zone.trans_wall[0];

    let idx = lo.partition_point(|&lo_i| lo_i <= local_seconds);

    if idx == 0 {
        return zone.type_before.clone();
    }

    let transition = idx - 1;

    if local_seconds < hi[transition] {
        // Straddles the gap or overlap created by this transition: fold
        // picks the pre-transition (0) or post-transition (1) side.
        return if fold == 0 {
            offset_before_type(zone, transition)
        } else {
            type_at(zone, transition)
        };
    }

    if transition == zone.trans_utc.len() - 1 {
        return match &zone.tail_rule {
            Some(rule) => rule.resolve_local(local_seconds, fold),
            None => type_at(zone, transition),
        };
    }

    type_at(zone, transition)
}

/// Project a UTC instant to its local wall-clock reading, together with
/// the fold that recovers the same type from [`resolve_local`].
pub fn fromutc(zone: &BuiltZone, seconds: i64) -> (TypeRecord, i64, u8) {
    let type_record = type_for_utc(zone, seconds);
    let wall_seconds = seconds + i64::from(type_record.utc_offset());
    let fold = if resolve_local(zone, wall_seconds, 0).utc_offset() == type_record.utc_offset() {
        0
    } else {
        1
    };
    (type_record, wall_seconds, fold)
}

fn type_at(zone: &BuiltZone, transition_idx: usize) -> TypeRecord {
    zone.types[zone.trans_type_idx[transition_idx] as usize].clone()
}

fn offset_before_type(zone: &BuiltZone, transition_idx: usize) -> TypeRecord {
    if transition_idx == 0 {
        zone.type_before.clone()
    } else {
        type_at(zone, transition_idx - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tzif::{decode, RawType};
    use crate::builder::build;
    use crate::tzif::DecodedTzif;

    fn two_transition_zone() -> BuiltZone {
        let decoded = DecodedTzif {
            version: 2,
            trans_utc: vec![1_000_000, 2_000_000],
            trans_type_idx: vec![1, 0],
            types: vec![
                RawType {
                    utc_offset: -5 * 3600,
                    is_dst: false,
                    abbr_index: 0,
                },
                RawType {
                    utc_offset: -4 * 3600,
                    is_dst: true,
                    abbr_index: 4,
                },
            ],
            abbrs: b"STD\0DST\0".to_vec(),
            leap_table: Vec::new(),
            tail_rule_bytes: None,
        };
        build(&decoded).unwrap()
    }

    #[test]
    fn before_first_transition_uses_type_before() {
        let zone = two_transition_zone();
        let t = type_for_utc(&zone, 0);
        assert_eq!(t.utc_offset(), -5 * 3600);
    }

    #[test]
    fn after_last_transition_without_tail_rule_uses_last_type() {
        let zone = two_transition_zone();
        let t = type_for_utc(&zone, 3_000_000);
        assert_eq!(t.utc_offset(), -5 * 3600);
    }

    #[test]
    fn exact_transition_instant_uses_post_transition_type() {
        let zone = two_transition_zone();
        let t = type_for_utc(&zone, 1_000_000);
        assert_eq!(t.utc_offset(), -4 * 3600);
    }

    #[test]
    fn exact_instant_of_last_transition_defers_to_tail_rule_when_present() {
        let decoded = DecodedTzif {
            version: 2,
            trans_utc: vec![0],
            trans_type_idx: vec![0],
            types: vec![RawType {
                utc_offset: -8 * 3600,
                is_dst: false,
                abbr_index: 0,
            }],
            abbrs: b"SENTINEL\0".to_vec(),
            leap_table: Vec::new(),
            tail_rule_bytes: Some("PST8PDT,M3.2.0,M11.1.0".to_string()),
        };
        let zone = build(&decoded).unwrap();
        // Seconds 0 (1970-01-01, winter) is the instant of the zone's
        // only (and therefore last) recorded transition; the tail rule,
        // not the stored type, governs it.
        let t = type_for_utc(&zone, 0);
        assert_eq!(t.abbr(), "PST");
    }

    #[test]
    fn spring_forward_gap_resolves_by_fold() {
        let zone = two_transition_zone();
        // Transition 0: -5h -> -4h, an offset increase (gap).
        let local_in_gap = zone.trans_wall[1][0] + 1_800;
        assert_eq!(resolve_local(&zone, local_in_gap, 0).utc_offset(), -5 * 3600);
        assert_eq!(resolve_local(&zone, local_in_gap, 1).utc_offset(), -4 * 3600);
    }

    #[test]
    fn fall_back_overlap_resolves_by_fold() {
        let zone = two_transition_zone();
        // Transition 1: -4h -> -5h, an offset decrease (overlap).
        let local_in_overlap = zone.trans_wall[1][1] + 1_800;
        assert_eq!(resolve_local(&zone, local_in_overlap, 0).utc_offset(), -4 * 3600);
        assert_eq!(resolve_local(&zone, local_in_overlap, 1).utc_offset(), -5 * 3600);
    }

    #[test]
    fn fromutc_picks_the_fold_that_reproduces_the_source_offset() {
        let zone = two_transition_zone();
        // Straddling the fall-back at transition 1 (-4h -> -5h) by the
        // exact one-hour overlap it creates: the same wall reading
        // recurs, once per side, and `fromutc` must recover whichever
        // offset actually produced it.
        let cdt_instant = zone.trans_utc[1] - 1_800;
        let cst_instant = cdt_instant + 3_600;
        let (cdt_type, cdt_wall, cdt_fold) = fromutc(&zone, cdt_instant);
        let (cst_type, cst_wall, cst_fold) = fromutc(&zone, cst_instant);
        assert_eq!(cdt_wall, cst_wall);
        assert_eq!(cdt_type.utc_offset(), -4 * 3600);
        assert_eq!(cst_type.utc_offset(), -5 * 3600);
        assert_eq!(cdt_fold, 0);
        assert_eq!(cst_fold, 1);
        assert_eq!(resolve_local(&zone, cdt_wall, cdt_fold).utc_offset(), cdt_type.utc_offset());
        assert_eq!(resolve_local(&zone, cst_wall, cst_fold).utc_offset(), cst_type.utc_offset());
    }

    #[test]
    fn decode_roundtrips_through_builder() {
        let mut data = Vec::new();
        data.extend_from_slice(b"TZif");
        data.push(0);
        data.extend_from_slice(&[0u8; 15]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(&0i32.to_be_bytes());
        data.push(0);
        data.push(0);
        data.extend_from_slice(b"UTC\0");
        let decoded = decode(&data).unwrap();
        let built = build(&decoded).unwrap();
        assert_eq!(type_for_utc(&built, 0).utc_offset(), 0);
    }
}
