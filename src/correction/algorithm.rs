use chrono::{DateTime, Utc};

use crate::correction::config::CorrectionConfig;
use crate::correction::digits::{prefix_value, resolve_effective_digit, zero_padded_digits};
use crate::correction::flow::{elapsed_minutes, implied_flow_rate, per_minute};
use crate::correction::outcome::{CorrectedReading, CorrectionOutcome, RejectReason};
use crate::error::{ValidationError, ValidationResult};
use crate::models::{MeterHistory, Observation, Reading};
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Reconciles noisy digit observations against a meter's accepted history.
///
/// The engine holds only configuration. It is safe to share between meters, but calls
/// for the same meter must be serialised by the caller together with the history fetch
/// and the write of the result.
#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    config: CorrectionConfig,
}

/// State of the left-to-right digit scan.
struct DigitScan {
    digits: Vec<u8>,
    prefix: u64,
    confidence: f64,
    negative_correction: bool,
    fallback_positions: Vec<usize>,
}

impl CorrectionEngine {
    pub fn new(config: CorrectionConfig) -> ValidationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Corrects an observation, using the wall clock if the observation is not newer
    /// than the last reading.
    pub fn correct(
        &self,
        meter: &str,
        history: &MeterHistory,
        observation: &Observation,
    ) -> ValidationResult<CorrectionOutcome> {
        self.correct_at(meter, history, observation, Utc::now())
    }

    /// Same as [`correct`](Self::correct) with an explicit current time.
    pub fn correct_at(
        &self,
        meter: &str,
        history: &MeterHistory,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> ValidationResult<CorrectionOutcome> {
        let segments = self.config.segments;
        if observation.segment_count() != segments {
            return Err(ValidationError::SegmentCountMismatch {
                expected: segments,
                actual: observation.segment_count(),
            });
        }

        let Some(last) = history.last.as_ref() else {
            log_info!("[Correction ({meter})] No baseline reading, skipping correction");
            return Ok(CorrectionOutcome::NoBaseline);
        };

        let last_digits = zero_padded_digits(last.value, segments)?;
        let anchor_digits = self.negative_correction_anchor(meter, last, history.second_last.as_ref());

        let scan = self.scan_digits(meter, observation, &last_digits, anchor_digits.as_deref());
        let corrected_value = scan.prefix;

        let (observed_at, clock_skew) = if observation.timestamp() > last.timestamp {
            (observation.timestamp(), false)
        } else {
            log_warn!(
                "[Correction ({meter})] Observation at {} is not after last reading at {}, using current time",
                observation.timestamp(),
                last.timestamp
            );
            (now, true)
        };

        let elapsed = elapsed_minutes(last.timestamp, observed_at, self.config.elapsed_time_mode);
        let flow_rate = implied_flow_rate(corrected_value, last.value, elapsed);
        let limit = per_minute(self.config.max_flow_rate);

        let reason = if !scan.fallback_positions.is_empty() {
            Some(RejectReason::DigitFallback {
                positions: scan.fallback_positions,
            })
        } else if flow_rate > limit {
            Some(RejectReason::FlowRateExceeded { flow_rate, limit })
        } else if flow_rate < 0.0 && !self.config.allow_negative_correction {
            Some(RejectReason::NegativeFlow { flow_rate })
        } else {
            None
        };

        if let Some(reason) = reason {
            log_warn!(
                "[Correction ({meter})] Rejected candidate {corrected_value}: {reason:?}"
            );
            return Ok(CorrectionOutcome::Rejected {
                reason,
                candidate_value: corrected_value,
            });
        }

        log_info!(
            "[Correction ({meter})] Accepted {corrected_value} (confidence {:.3}, flow {flow_rate:.5}/min)",
            scan.confidence
        );

        Ok(CorrectionOutcome::Accepted(CorrectedReading {
            value: corrected_value,
            confidence: scan.confidence,
            flow_rate,
            negative_correction: scan.negative_correction,
            clock_skew,
        }))
    }

    /// Digits of the second-to-last reading when a negative correction may be attempted.
    fn negative_correction_anchor(
        &self,
        meter: &str,
        last: &Reading,
        second_last: Option<&Reading>,
    ) -> Option<Vec<u8>> {
        if !self.config.allow_negative_correction
            || last.confidence >= self.config.low_confidence_threshold
        {
            return None;
        }

        let second_last = second_last?;
        match zero_padded_digits(second_last.value, self.config.segments) {
            Ok(digits) => Some(digits),
            Err(err) => {
                log_warn!("[Correction ({meter})] Ignoring second-to-last reading: {err}");
                None
            }
        }
    }

    /// Greedy scan: commits to the first acceptable candidate at each position and never
    /// revisits an earlier one.
    fn scan_digits(
        &self,
        meter: &str,
        observation: &Observation,
        last_digits: &[u8],
        anchor_digits: Option<&[u8]>,
    ) -> DigitScan {
        let mut scan = DigitScan {
            digits: Vec::with_capacity(last_digits.len()),
            prefix: 0,
            confidence: 1.0,
            negative_correction: false,
            fallback_positions: Vec::new(),
        };

        for (position, candidates) in observation.positions().iter().enumerate() {
            let last_prefix = prefix_value(&last_digits[..=position]);
            let mut accepted = None;

            for candidate in candidates {
                let digit =
                    resolve_effective_digit(candidate.label, position, &scan.digits, last_digits);
                let tentative_prefix = scan.prefix * 10 + u64::from(digit);
                let tentative_confidence = scan.confidence * candidate.confidence;

                if tentative_prefix >= last_prefix
                    || (scan.negative_correction
                        && tentative_confidence > self.config.negative_continuation_min_confidence)
                {
                    accepted = Some((digit, tentative_confidence));
                    break;
                }

                if let Some(anchor) = anchor_digits {
                    if tentative_confidence > self.config.negative_correction_min_confidence
                        && tentative_prefix >= prefix_value(&anchor[..=position])
                    {
                        log_info!(
                            "[Correction ({meter})] Negative correction accepted at position {position}"
                        );
                        scan.negative_correction = true;
                        accepted = Some((digit, tentative_confidence));
                        break;
                    }
                }
            }

            match accepted {
                Some((digit, confidence)) => {
                    scan.digits.push(digit);
                    scan.prefix = scan.prefix * 10 + u64::from(digit);
                    scan.confidence = confidence;
                }
                None => {
                    let digit = last_digits[position];
                    log_warn!(
                        "[Correction ({meter})] Fallback at position {position}: keeping digit {digit}"
                    );
                    scan.digits.push(digit);
                    scan.prefix = scan.prefix * 10 + u64::from(digit);
                    scan.fallback_positions.push(position);
                }
            }
        }

        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::config::ElapsedTimeMode;
    use crate::models::DigitCandidate;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn engine(segments: usize) -> CorrectionEngine {
        CorrectionEngine::new(CorrectionConfig::with_segments(segments)).unwrap()
    }

    fn negative_engine(segments: usize) -> CorrectionEngine {
        let mut config = CorrectionConfig::with_segments(segments);
        config.allow_negative_correction = true;
        CorrectionEngine::new(config).unwrap()
    }

    fn top(digits: &[u8], confidence: f64, minutes: i64) -> Observation {
        Observation::new(
            digits
                .iter()
                .map(|d| vec![DigitCandidate::digit(*d, confidence)])
                .collect(),
            t0() + Duration::minutes(minutes),
        )
        .unwrap()
    }

    fn history(value: u64) -> MeterHistory {
        MeterHistory::new(Reading::new(value, t0(), 0.9), None)
    }

    fn accepted(outcome: CorrectionOutcome) -> CorrectedReading {
        match outcome {
            CorrectionOutcome::Accepted(reading) => reading,
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[test]
    fn worked_example() {
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(0, 0.9)],
                vec![DigitCandidate::digit(4, 0.8)],
                vec![DigitCandidate::digit(6, 0.95)],
            ],
            t0() + Duration::minutes(10),
        )
        .unwrap();

        let reading = accepted(engine(3).correct("m", &history(45), &observation).unwrap());
        assert_eq!(reading.value, 46);
        assert!((reading.confidence - 0.684).abs() < 1e-9);
        assert!(!reading.negative_correction);
        assert!(!reading.clock_skew);
    }

    #[test]
    fn top_candidates_form_value_and_confidence_product() {
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(1, 0.5), DigitCandidate::digit(0, 0.4)],
                vec![DigitCandidate::digit(2, 0.9)],
                vec![DigitCandidate::digit(3, 0.7)],
            ],
            t0() + Duration::days(1) + Duration::hours(1),
        )
        .unwrap();
        let mut config = CorrectionConfig::with_segments(3);
        config.max_flow_rate = 1000.0;
        let engine = CorrectionEngine::new(config).unwrap();

        let reading = accepted(engine.correct("m", &history(45), &observation).unwrap());
        assert_eq!(reading.value, 123);
        assert!((reading.confidence - 0.5 * 0.9 * 0.7).abs() < 1e-12);
    }

    #[test]
    fn lower_ranked_candidate_used_when_top_goes_backwards() {
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(0, 1.0)],
                vec![DigitCandidate::digit(3, 0.6), DigitCandidate::digit(4, 0.3)],
                vec![DigitCandidate::digit(5, 1.0)],
            ],
            t0() + Duration::minutes(5),
        )
        .unwrap();

        let reading = accepted(engine(3).correct("m", &history(45), &observation).unwrap());
        assert_eq!(reading.value, 45);
        assert!((reading.confidence - 0.3).abs() < 1e-12);
        assert_eq!(reading.flow_rate, 0.0);
    }

    #[test]
    fn rotation_marker_rolls_over_after_carry() {
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(0, 1.0)],
                vec![DigitCandidate::digit(5, 1.0)],
                vec![DigitCandidate::rotation(0.8)],
            ],
            t0() + Duration::minutes(30),
        )
        .unwrap();

        let reading = accepted(engine(3).correct("m", &history(45), &observation).unwrap());
        assert_eq!(reading.value, 50);
        assert!((reading.confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn rotation_marker_holds_digit_without_carry() {
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(0, 1.0)],
                vec![DigitCandidate::rotation(0.7)],
                vec![DigitCandidate::digit(7, 1.0)],
            ],
            t0() + Duration::minutes(30),
        )
        .unwrap();

        let reading = accepted(engine(3).correct("m", &history(45), &observation).unwrap());
        assert_eq!(reading.value, 47);
    }

    #[test]
    fn flow_bound_rejects_implausible_jump() {
        let observation = top(&[5, 0, 0, 0, 0, 0], 0.99, 1);

        let outcome = engine(6).correct("m", &history(100), &observation).unwrap();
        match outcome {
            CorrectionOutcome::Rejected {
                reason: RejectReason::FlowRateExceeded { flow_rate, limit },
                candidate_value,
            } => {
                assert_eq!(candidate_value, 500_000);
                assert!(flow_rate > limit);
            }
            other => panic!("expected flow rejection, got {other:?}"),
        }
    }

    #[test]
    fn negative_correction_recovers_from_low_confidence_misread() {
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(3, 0.8)],
                vec![DigitCandidate::digit(8, 0.75)],
            ],
            t0() + Duration::minutes(10),
        )
        .unwrap();
        let history = MeterHistory::new(
            Reading::new(45, t0(), 0.1),
            Some(Reading::new(35, t0() - Duration::minutes(10), 0.9)),
        );

        let reading =
            accepted(negative_engine(2).correct("m", &history, &observation).unwrap());
        assert_eq!(reading.value, 38);
        assert!((reading.confidence - 0.6).abs() < 1e-12);
        assert!(reading.negative_correction);
        assert!(reading.flow_rate < 0.0);
    }

    #[test]
    fn negative_correction_relaxes_later_digits() {
        // After the first digit re-anchors, the 0.2 candidate passes only through the
        // relaxed continuation threshold.
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(4, 0.9)],
                vec![DigitCandidate::digit(0, 0.2)],
            ],
            t0() + Duration::minutes(10),
        )
        .unwrap();
        let history = MeterHistory::new(
            Reading::new(55, t0(), 0.1),
            Some(Reading::new(41, t0() - Duration::minutes(10), 0.9)),
        );

        let reading =
            accepted(negative_engine(2).correct("m", &history, &observation).unwrap());
        assert_eq!(reading.value, 40);
        assert!(reading.negative_correction);
        assert!((reading.confidence - 0.18).abs() < 1e-12);
    }

    #[test]
    fn negative_correction_needs_low_confidence_last_reading() {
        let observation = top(&[3, 8], 0.9, 10);
        let history = MeterHistory::new(
            Reading::new(45, t0(), 0.5),
            Some(Reading::new(40, t0() - Duration::minutes(10), 0.9)),
        );

        let outcome = negative_engine(2).correct("m", &history, &observation).unwrap();
        assert_eq!(
            outcome,
            CorrectionOutcome::Rejected {
                reason: RejectReason::DigitFallback {
                    positions: vec![0]
                },
                candidate_value: 48,
            }
        );
    }

    #[test]
    fn negative_correction_needs_second_last_reading() {
        let observation = top(&[3, 8], 0.9, 10);
        let history = MeterHistory::new(Reading::new(45, t0(), 0.1), None);

        let outcome = negative_engine(2).correct("m", &history, &observation).unwrap();
        assert!(matches!(
            outcome,
            CorrectionOutcome::Rejected {
                reason: RejectReason::DigitFallback { .. },
                ..
            }
        ));
    }

    #[test]
    fn negative_correction_disabled_by_default() {
        let observation = top(&[3, 8], 0.9, 10);
        let history = MeterHistory::new(
            Reading::new(45, t0(), 0.1),
            Some(Reading::new(40, t0() - Duration::minutes(10), 0.9)),
        );

        let outcome = engine(2).correct("m", &history, &observation).unwrap();
        assert!(!outcome.is_accepted());
    }

    #[test]
    fn fallback_rejects_even_when_flow_is_fine() {
        // The middle wheel reads below the last value with no alternative, so the scan
        // falls back to the old digit; the final value equals the last reading.
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(0, 1.0)],
                vec![DigitCandidate::digit(3, 0.9)],
                vec![DigitCandidate::digit(5, 0.9)],
            ],
            t0() + Duration::minutes(10),
        )
        .unwrap();

        let outcome = engine(3).correct("m", &history(45), &observation).unwrap();
        assert_eq!(
            outcome,
            CorrectionOutcome::Rejected {
                reason: RejectReason::DigitFallback {
                    positions: vec![1]
                },
                candidate_value: 45,
            }
        );
    }

    #[test]
    fn no_baseline_without_history() {
        let outcome = engine(3)
            .correct("m", &MeterHistory::default(), &top(&[0, 4, 6], 0.9, 1))
            .unwrap();
        assert_eq!(outcome, CorrectionOutcome::NoBaseline);
    }

    #[test]
    fn segment_mismatch_is_a_validation_error() {
        let result = engine(4).correct("m", &history(45), &top(&[0, 4, 6], 0.9, 1));
        assert_eq!(
            result,
            Err(ValidationError::SegmentCountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn segment_mismatch_wins_over_missing_baseline() {
        let result = engine(4).correct("m", &MeterHistory::default(), &top(&[0, 4, 6], 0.9, 1));
        assert_eq!(
            result,
            Err(ValidationError::SegmentCountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn oversized_baseline_is_a_validation_error() {
        let result = engine(2).correct("m", &history(450), &top(&[4, 6], 0.9, 1));
        assert_eq!(
            result,
            Err(ValidationError::ReadingExceedsSegments {
                value: 450,
                segments: 2
            })
        );
    }

    #[test]
    fn stale_observation_uses_supplied_clock() {
        let observation = top(&[0, 4, 6], 0.9, -5);
        let now = t0() + Duration::minutes(10);

        let reading = accepted(
            engine(3)
                .correct_at("m", &history(45), &observation, now)
                .unwrap(),
        );
        assert!(reading.clock_skew);
        assert!((reading.flow_rate - 0.001 / 10.0).abs() < 1e-12);
    }

    #[test]
    fn duplicate_timestamp_with_same_clock_has_zero_elapsed_time() {
        let observation = top(&[0, 4, 6], 0.9, 0);

        let outcome = engine(3)
            .correct_at("m", &history(45), &observation, t0())
            .unwrap();
        assert!(matches!(
            outcome,
            CorrectionOutcome::Rejected {
                reason: RejectReason::FlowRateExceeded { .. },
                ..
            }
        ));
    }

    #[test]
    fn elapsed_time_mode_changes_multi_day_gaps() {
        // 900 thousandths over one day and ten minutes
        let observation = top(&[0, 9, 4, 5], 1.0, 24 * 60 + 10);
        let history = history(45);

        let legacy = engine(4).correct("m", &history, &observation).unwrap();
        assert!(matches!(
            legacy,
            CorrectionOutcome::Rejected {
                reason: RejectReason::FlowRateExceeded { .. },
                ..
            }
        ));

        let mut config = CorrectionConfig::with_segments(4);
        config.elapsed_time_mode = ElapsedTimeMode::TotalDuration;
        let total = CorrectionEngine::new(config)
            .unwrap()
            .correct("m", &history, &observation)
            .unwrap();
        assert_eq!(accepted(total).value, 945);
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let observation = Observation::new(
            vec![
                vec![DigitCandidate::digit(0, 0.7), DigitCandidate::rotation(0.2)],
                vec![DigitCandidate::rotation(0.6), DigitCandidate::digit(5, 0.3)],
                vec![DigitCandidate::digit(2, 0.5), DigitCandidate::digit(9, 0.4)],
            ],
            t0() + Duration::minutes(3),
        )
        .unwrap();
        let engine = engine(3);

        let first = engine.correct("m", &history(45), &observation).unwrap();
        let second = engine.correct("m", &history(45), &observation).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn accepted_values_fit_segment_count() {
        let engine = engine(3);
        for last in [0u64, 45, 500, 998] {
            let digits: Vec<u8> = format!("{:03}", last + 1).bytes().map(|b| b - b'0').collect();
            let outcome = engine
                .correct("m", &history(last), &top(&digits, 0.9, 60))
                .unwrap();
            let reading = accepted(outcome);
            assert!(format!("{:03}", reading.value).len() == 3);
        }
    }
}
