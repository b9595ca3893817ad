//! Joins fatigue risk with activity anomaly/index rows into one report row
//! per (entity, day).

use crate::anomaly::AnomalyLabel;
use crate::dataset::EntityId;
use crate::error::AlignmentError;
use crate::index::ActivityIndex;
use crate::risk::RiskLabel;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

/// First synthetic date; each entity is shifted from here by its offset.
pub const SYNTHETIC_EPOCH: (i32, u32, u32) = (2024, 1, 1);
const NUMERIC_OFFSET_SPAN: u64 = 36_500;
const HASHED_OFFSET_SPAN: u64 = 365;

/// Anomaly flag and activity index for one row of the shared feature frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySignal {
    pub entity_id: EntityId,
    pub timestamp: Option<NaiveDate>,
    pub is_anomaly: bool,
    pub index: f64,
}

impl ActivitySignal {
    /// Pair anomaly labels with indices computed from the same frame.
    pub fn combine(anomalies: &[AnomalyLabel], indices: &[ActivityIndex]) -> Result<Vec<Self>, AlignmentError> {
        if anomalies.len() != indices.len() {
            return Err(AlignmentError::LengthMismatch {
                left: anomalies.len(),
                right: indices.len(),
            });
        }
        anomalies
            .iter()
            .zip(indices)
            .enumerate()
            .map(|(position, (a, i))| {
                if a.entity_id != i.entity_id {
                    return Err(AlignmentError::EntityMismatch {
                        position,
                        left: a.entity_id.to_string(),
                        right: i.entity_id.to_string(),
                    });
                }
                Ok(ActivitySignal {
                    entity_id: a.entity_id.clone(),
                    timestamp: a.timestamp.or(i.timestamp),
                    is_anomaly: a.is_anomaly,
                    index: i.index,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRow {
    pub entity_id: EntityId,
    pub timestamp: Option<NaiveDate>,
    /// `None` when the fatigue model could not be trained
    pub fatigue_flag: Option<bool>,
    pub fatigue_probability: Option<f64>,
    pub activity_anomaly: bool,
    pub activity_index: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Inner join on (entity, date)
    KeyJoin,
    /// Row-order pairing after entity sort, alignment verified
    Positional,
    /// No risk side; activity rows only
    ActivityOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedReport {
    pub mode: FusionMode,
    pub rows: Vec<UnifiedRow>,
}

/// Days from [`SYNTHETIC_EPOCH`] for an entity's first synthetic date.
pub fn synthetic_offset(entity: &EntityId) -> u64 {
    match entity.as_integer() {
        Some(n) if n >= 0 => n as u64 % NUMERIC_OFFSET_SPAN,
        _ => {
            let digest = Sha256::digest(entity.as_str().as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            u64::from_be_bytes(head) % HASHED_OFFSET_SPAN
        }
    }
}

fn synthetic_start(entity: &EntityId) -> Option<NaiveDate> {
    let (y, m, d) = SYNTHETIC_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(synthetic_offset(entity)))
}

/// Give consecutive daily dates to every entity that has no dated row,
/// keeping row order within the entity. Entities with any real date are
/// left untouched.
fn fill_synthetic_dates(rows: &mut [UnifiedRow]) {
    let mut undated: HashMap<EntityId, bool> = HashMap::new();
    for r in rows.iter() {
        let entry = undated.entry(r.entity_id.clone()).or_insert(true);
        *entry &= r.timestamp.is_none();
    }
    let mut next: HashMap<EntityId, NaiveDate> = HashMap::new();
    let mut filled = 0usize;
    for r in rows.iter_mut() {
        if !undated.get(&r.entity_id).copied().unwrap_or(false) {
            continue;
        }
        let day = match next.get(&r.entity_id) {
            Some(d) => Some(*d),
            None => synthetic_start(&r.entity_id),
        };
        r.timestamp = day;
        if let Some(d) = day.and_then(|d| d.checked_add_days(Days::new(1))) {
            next.insert(r.entity_id.clone(), d);
        }
        filled += 1;
    }
    if filled > 0 {
        warn!(rows = filled, "synthetic report dates assigned");
    }
}

fn stable_entity_order<T>(items: &[T], entity: impl Fn(&T) -> &EntityId) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| entity(&items[a]).cmp(entity(&items[b])));
    order
}

pub struct ReportFusion;

impl ReportFusion {
    /// Key join when every row on both sides is dated, otherwise verified
    /// positional pairing. Positional pairs must agree on entity and, where
    /// both sides carry one, on date.
    pub fn fuse(risk: &[RiskLabel], activity: &[ActivitySignal]) -> Result<FusedReport, AlignmentError> {
        let dated = risk.iter().all(|r| r.timestamp.is_some()) && activity.iter().all(|a| a.timestamp.is_some());
        let report = if dated {
            Self::join(risk, activity)
        } else {
            Self::positional(risk, activity)?
        };
        debug!(mode = ?report.mode, rows = report.rows.len(), "report fused");
        Ok(report)
    }

    fn join(risk: &[RiskLabel], activity: &[ActivitySignal]) -> FusedReport {
        let mut by_key: HashMap<(&EntityId, NaiveDate), Vec<&ActivitySignal>> = HashMap::new();
        for a in activity {
            if let Some(ts) = a.timestamp {
                by_key.entry((&a.entity_id, ts)).or_default().push(a);
            }
        }
        let mut rows = Vec::new();
        for r in risk {
            let Some(ts) = r.timestamp else { continue };
            for a in by_key.get(&(&r.entity_id, ts)).into_iter().flatten() {
                rows.push(UnifiedRow {
                    entity_id: r.entity_id.clone(),
                    timestamp: Some(ts),
                    fatigue_flag: Some(r.fatigue_flag),
                    fatigue_probability: Some(r.fatigue_probability),
                    activity_anomaly: a.is_anomaly,
                    activity_index: a.index,
                });
            }
        }
        FusedReport {
            mode: FusionMode::KeyJoin,
            rows,
        }
    }

    fn positional(risk: &[RiskLabel], activity: &[ActivitySignal]) -> Result<FusedReport, AlignmentError> {
        if risk.len() != activity.len() {
            return Err(AlignmentError::LengthMismatch {
                left: risk.len(),
                right: activity.len(),
            });
        }
        let left = stable_entity_order(risk, |r| &r.entity_id);
        let right = stable_entity_order(activity, |a| &a.entity_id);

        let mut rows = Vec::with_capacity(risk.len());
        for (position, (&li, &ri)) in left.iter().zip(&right).enumerate() {
            let (r, a) = (&risk[li], &activity[ri]);
            if r.entity_id != a.entity_id {
                return Err(AlignmentError::EntityMismatch {
                    position,
                    left: r.entity_id.to_string(),
                    right: a.entity_id.to_string(),
                });
            }
            if let (Some(left), Some(right)) = (r.timestamp, a.timestamp) {
                if left != right {
                    return Err(AlignmentError::TimestampMismatch {
                        position,
                        left: left.to_string(),
                        right: right.to_string(),
                    });
                }
            }
            rows.push(UnifiedRow {
                entity_id: r.entity_id.clone(),
                timestamp: r.timestamp.or(a.timestamp),
                fatigue_flag: Some(r.fatigue_flag),
                fatigue_probability: Some(r.fatigue_probability),
                activity_anomaly: a.is_anomaly,
                activity_index: a.index,
            });
        }
        fill_synthetic_dates(&mut rows);
        Ok(FusedReport {
            mode: FusionMode::Positional,
            rows,
        })
    }

    /// Partial report for runs where fatigue scoring was unavailable.
    pub fn activity_only(activity: &[ActivitySignal]) -> FusedReport {
        let mut rows: Vec<UnifiedRow> = stable_entity_order(activity, |a| &a.entity_id)
            .into_iter()
            .map(|i| {
                let a = &activity[i];
                UnifiedRow {
                    entity_id: a.entity_id.clone(),
                    timestamp: a.timestamp,
                    fatigue_flag: None,
                    fatigue_probability: None,
                    activity_anomaly: a.is_anomaly,
                    activity_index: a.index,
                }
            })
            .collect();
        fill_synthetic_dates(&mut rows);
        FusedReport {
            mode: FusionMode::ActivityOnly,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 5, d)
    }

    fn risk(entity: &str, ts: Option<NaiveDate>, p: f64) -> RiskLabel {
        RiskLabel {
            entity_id: EntityId::from(entity),
            timestamp: ts,
            fatigue_probability: p,
            fatigue_flag: p >= 0.5,
        }
    }

    fn act(entity: &str, ts: Option<NaiveDate>, anomaly: bool, index: f64) -> ActivitySignal {
        ActivitySignal {
            entity_id: EntityId::from(entity),
            timestamp: ts,
            is_anomaly: anomaly,
            index,
        }
    }

    #[test]
    fn joins_matching_days() {
        let risk_rows = vec![risk("1", date(1), 0.1), risk("1", date(2), 0.7), risk("1", date(3), 0.4)];
        let activity = vec![
            act("1", date(3), true, 0.3),
            act("1", date(1), false, 0.9),
            act("1", date(2), false, 0.6),
        ];
        let report = ReportFusion::fuse(&risk_rows, &activity).unwrap();
        assert_eq!(report.mode, FusionMode::KeyJoin);
        assert_eq!(report.rows.len(), 3);
        let triples: Vec<(f64, bool, f64)> = report
            .rows
            .iter()
            .map(|r| (r.fatigue_probability.unwrap(), r.activity_anomaly, r.activity_index))
            .collect();
        assert_eq!(triples, vec![(0.1, false, 0.9), (0.7, false, 0.6), (0.4, true, 0.3)]);
        assert_eq!(report.rows[1].fatigue_flag, Some(true));
    }

    #[test]
    fn join_drops_unmatched_rows() {
        let risk_rows = vec![risk("1", date(1), 0.1), risk("2", date(1), 0.2)];
        let activity = vec![act("1", date(1), false, 0.5), act("1", date(2), false, 0.5)];
        let report = ReportFusion::fuse(&risk_rows, &activity).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].entity_id.as_str(), "1");
    }

    #[test]
    fn undated_side_falls_back_to_positions() {
        let risk_rows = vec![risk("2", None, 0.9), risk("1", None, 0.1), risk("1", None, 0.2)];
        let activity = vec![act("1", date(1), false, 0.4), act("1", date(2), true, 0.5), act("2", None, false, 0.6)];
        let report = ReportFusion::fuse(&risk_rows, &activity).unwrap();
        assert_eq!(report.mode, FusionMode::Positional);
        let got: Vec<(&str, f64, f64)> = report
            .rows
            .iter()
            .map(|r| (r.entity_id.as_str(), r.fatigue_probability.unwrap(), r.activity_index))
            .collect();
        assert_eq!(got, vec![("1", 0.1, 0.4), ("1", 0.2, 0.5), ("2", 0.9, 0.6)]);
        assert_eq!(report.rows[0].timestamp, date(1));
        // entity 2 has no date on either side: epoch + 2 days
        assert_eq!(report.rows[2].timestamp, NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[test]
    fn positional_length_mismatch_fails() {
        let risk_rows = vec![risk("1", None, 0.1)];
        let activity = vec![act("1", None, false, 0.4), act("1", None, false, 0.5)];
        assert_eq!(
            ReportFusion::fuse(&risk_rows, &activity).unwrap_err(),
            AlignmentError::LengthMismatch { left: 1, right: 2 }
        );
    }

    #[test]
    fn positional_entity_mismatch_fails() {
        let risk_rows = vec![risk("1", None, 0.1), risk("1", None, 0.1)];
        let activity = vec![act("1", None, false, 0.4), act("3", None, false, 0.5)];
        assert!(matches!(
            ReportFusion::fuse(&risk_rows, &activity).unwrap_err(),
            AlignmentError::EntityMismatch { position: 1, .. }
        ));
    }

    #[test]
    fn positional_date_mismatch_fails() {
        let risk_rows = vec![risk("1", date(1), 0.9), risk("1", None, 0.1)];
        let activity = vec![act("1", date(9), true, 0.4), act("1", date(10), false, 0.5)];
        assert_eq!(
            ReportFusion::fuse(&risk_rows, &activity).unwrap_err(),
            AlignmentError::TimestampMismatch {
                position: 0,
                left: "2024-05-01".into(),
                right: "2024-05-09".into(),
            }
        );
    }

    #[test]
    fn synthetic_dates_are_consecutive_per_entity() {
        let activity = vec![act("5", None, false, 0.1), act("5", None, false, 0.2), act("user-x", None, true, 0.3)];
        let report = ReportFusion::activity_only(&activity);
        assert_eq!(report.rows[0].timestamp, NaiveDate::from_ymd_opt(2024, 1, 6));
        assert_eq!(report.rows[1].timestamp, NaiveDate::from_ymd_opt(2024, 1, 7));
        let hashed = report.rows[2].timestamp.unwrap();
        assert!(hashed >= NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(hashed < NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(report.rows[0].fatigue_probability, None);
    }

    #[test]
    fn combine_checks_alignment() {
        let anomalies = vec![AnomalyLabel {
            entity_id: EntityId::from("1"),
            timestamp: date(1),
            is_anomaly: true,
        }];
        let indices = vec![ActivityIndex {
            entity_id: EntityId::from("2"),
            timestamp: date(1),
            index: 0.5,
        }];
        assert!(ActivitySignal::combine(&anomalies, &indices).is_err());
        assert!(ActivitySignal::combine(&anomalies, &[]).is_err());
    }
}
