//! Derived-data builder: reconciles a decoded TZif file into the arrays
//! the lookup engine walks.

use std::sync::Arc;

use crate::error::TzResult;
use crate::posix::TailRule;
use crate::tzif::DecodedTzif;

/// A resolved local time type: an offset, whether it's DST, and an
/// abbreviation, all by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRecord {
    utc_offset: i32,
    is_dst: bool,
    dst_offset: i32,
    abbr: Arc<str>,
}

impl TypeRecord {
    pub fn new(utc_offset: i32, is_dst: bool, dst_offset: i32, abbr: impl Into<Arc<str>>) -> Self {
        Self {
            utc_offset,
            is_dst,
            dst_offset,
            abbr: abbr.into(),
        }
    }

    /// Offset east of UTC, in seconds.
    #[must_use]
    pub fn utc_offset(&self) -> i32 {
        self.utc_offset
    }

    #[must_use]
    pub fn is_dst(&self) -> bool {
        self.is_dst
    }

    /// How much of `utc_offset` is attributable to DST, in seconds.
    /// `0` exactly when `is_dst` is `false`.
    #[must_use]
    pub fn dst_offset(&self) -> i32 {
        self.dst_offset
    }

    #[must_use]
    pub fn abbr(&self) -> &str {
        &self.abbr
    }
}

/// A fully reconciled zone: a transition table indexed by both UTC and
/// wall time, plus an optional POSIX tail rule for instants past the
/// last recorded transition.
#[derive(Debug, Clone)]
pub struct BuiltZone {
    /// Transition instants, ascending, in UTC seconds.
    pub trans_utc: Vec<i64>,
    /// `trans_wall[0][i]` is the wall-time reading at which transition
    /// `i` is first observed (using the larger of the surrounding
    /// offsets); `trans_wall[1][i]` uses the smaller one.
    pub trans_wall: [Vec<i64>; 2],
    /// Index into `types` describing the interval starting at
    /// `trans_utc[i]`.
    pub trans_type_idx: Vec<u16>,
    pub types: Vec<TypeRecord>,
    /// The type in effect before the first transition (or for all time,
    /// if there are no transitions).
    pub type_before: TypeRecord,
    /// The POSIX tail rule governing instants at or past the last
    /// transition, if the file carried a v2+ footer.
    pub tail_rule: Option<TailRule>,
}

const FALLBACK_DST_OFFSET: i32 = 3600;

/// Reconcile a decoded TZif file into a [`BuiltZone`].
pub fn build(decoded: &DecodedTzif) -> TzResult<BuiltZone> {
    let types = resolve_types(decoded)?;

    let trans_type_idx: Vec<u16> = decoded
        .trans_type_idx
        .iter()
        .map(|&idx| u16::from(idx))
        .collect();

    let type_before = first_standard_type(&types).unwrap_or_else(|| {
        types
            .first()
            .cloned()
            .unwrap_or_else(|| TypeRecord::new(0, false, 0, "UTC"))
    });

    let trans_wall = build_wall_projection(&decoded.trans_utc, &trans_type_idx, &types, &type_before);

    let tail_rule = match &decoded.tail_rule_bytes {
        Some(bytes) if !bytes.is_empty() => Some(TailRule::parse(bytes)?),
        _ => None,
    };

    Ok(BuiltZone {
        trans_utc: decoded.trans_utc.clone(),
        trans_wall,
        trans_type_idx,
        types,
        type_before,
        tail_rule,
    })
}

/// Apply the DST-magnitude heuristic to every raw type: TZif never
/// stores how much of an offset is attributable to DST, only whether a
/// type is DST at all. For each DST type, at its first occurrence in
/// the transition sequence, this looks at the immediate predecessor
/// transition: if it's a standard type, the difference is the DST
/// magnitude. If the predecessor is itself DST (a multi-DST-type
/// transition, e.g. double summer time), it tries the immediate
/// successor instead. A type whose magnitude can't be pinned down
/// either way falls back to a flat hour. One pass, first occurrence
/// only — it does not retry a type that was deferred.
fn resolve_types(decoded: &DecodedTzif) -> TzResult<Vec<TypeRecord>> {
    let mut dst_offsets = vec![None; decoded.types.len()];
    let mut resolved = vec![false; decoded.types.len()];

    for i in 0..decoded.trans_type_idx.len() {
        let idx = decoded.trans_type_idx[i] as usize;
        let raw = decoded.types[idx];
        if !raw.is_dst || resolved[idx] {
            continue;
        }
        resolved[idx] = true;

        let predecessor_offset = if i == 0 {
            decoded.types.iter().find(|t| !t.is_dst).map(|t| t.utc_offset)
        } else {
            let predecessor = decoded.types[decoded.trans_type_idx[i - 1] as usize];
            (!predecessor.is_dst).then_some(predecessor.utc_offset)
        };

        if let Some(base) = predecessor_offset {
            dst_offsets[idx] = Some(raw.utc_offset - base);
            continue;
        }

        if let Some(&successor_idx) = decoded.trans_type_idx.get(i + 1) {
            let successor = decoded.types[successor_idx as usize];
            if !successor.is_dst {
                dst_offsets[idx] = Some(raw.utc_offset - successor.utc_offset);
            }
        }
    }

    decoded
        .types
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let abbr = decoded.abbr_at(raw.abbr_index)?;
            let dst_offset = if raw.is_dst {
                dst_offsets[i].unwrap_or(FALLBACK_DST_OFFSET)
            } else {
                0
            };
            Ok(TypeRecord::new(raw.utc_offset, raw.is_dst, dst_offset, abbr))
        })
        .collect()
}

fn first_standard_type(types: &[TypeRecord]) -> Option<TypeRecord> {
    types.iter().find(|t| !t.is_dst).cloned()
}

fn build_wall_projection(
    trans_utc: &[i64],
    trans_type_idx: &[u16],
    types: &[TypeRecord],
    type_before: &TypeRecord,
) -> [Vec<i64>; 2] {
    let mut earlier = Vec::with_capacity(trans_utc.len());
    let mut later = Vec::with_capacity(trans_utc.len());

    for (i, &utc) in trans_utc.iter().enumerate() {
        let prev_off = if i == 0 {
            type_before.utc_offset()
        } else {
            types[trans_type_idx[i - 1] as usize].utc_offset()
        };
        let next_off = types[trans_type_idx[i] as usize].utc_offset();
        let (hi, lo) = if prev_off >= next_off {
            (prev_off, next_off)
        } else {
            (next_off, prev_off)
        };
        earlier.push(utc + i64::from(hi));
        later.push(utc + i64::from(lo));
    }

    [earlier, later]
}
