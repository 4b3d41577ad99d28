use crate::error::{ValidationError, ValidationResult};
use crate::models::DigitLabel;

/// Zero-padded decimal digits of `value`, most-significant first.
pub fn zero_padded_digits(value: u64, segments: usize) -> ValidationResult<Vec<u8>> {
    let text = format!("{value:0>segments$}");
    if text.len() > segments {
        return Err(ValidationError::ReadingExceedsSegments { value, segments });
    }

    Ok(text.bytes().map(|b| b - b'0').collect())
}

/// Integer value of a digit prefix.
pub fn prefix_value(digits: &[u8]) -> u64 {
    digits
        .iter()
        .fold(0u64, |acc, digit| acc * 10 + u64::from(*digit))
}

/// Resolve a candidate label to the digit it stands for at `position`.
///
/// A rotation marker means the wheel is between two digits. If the wheel to the left
/// has moved up compared to the last reading, a carry went into this wheel and it has
/// just rolled over to zero; otherwise the wheel is taken as unchanged.
pub fn resolve_effective_digit(
    label: DigitLabel,
    position: usize,
    accepted: &[u8],
    last_digits: &[u8],
) -> u8 {
    match label {
        DigitLabel::Digit(digit) => digit,
        DigitLabel::RotationMarker => {
            let carried = position > 0
                && matches!(
                    (accepted.get(position - 1), last_digits.get(position - 1)),
                    (Some(now), Some(before)) if now > before
                );
            if carried {
                0
            } else {
                last_digits[position]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_segment_count() {
        assert_eq!(zero_padded_digits(45, 3).unwrap(), vec![0, 4, 5]);
        assert_eq!(zero_padded_digits(0, 4).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(zero_padded_digits(999, 3).unwrap(), vec![9, 9, 9]);
    }

    #[test]
    fn oversized_value_is_an_error() {
        assert_eq!(
            zero_padded_digits(1000, 3),
            Err(ValidationError::ReadingExceedsSegments {
                value: 1000,
                segments: 3
            })
        );
    }

    #[test]
    fn prefix_values() {
        assert_eq!(prefix_value(&[]), 0);
        assert_eq!(prefix_value(&[0, 4]), 4);
        assert_eq!(prefix_value(&[0, 4, 6]), 46);
    }

    #[test]
    fn rotation_rolls_to_zero_after_carry() {
        let last = [0, 4, 5];
        assert_eq!(
            resolve_effective_digit(DigitLabel::RotationMarker, 2, &[0, 5], &last),
            0
        );
    }

    #[test]
    fn rotation_holds_previous_digit_without_carry() {
        let last = [0, 4, 5];
        assert_eq!(
            resolve_effective_digit(DigitLabel::RotationMarker, 2, &[0, 4], &last),
            5
        );
        assert_eq!(
            resolve_effective_digit(DigitLabel::RotationMarker, 2, &[0, 3], &last),
            5
        );
        assert_eq!(resolve_effective_digit(DigitLabel::RotationMarker, 0, &[], &last), 0);
    }

    #[test]
    fn plain_digits_resolve_to_themselves() {
        assert_eq!(
            resolve_effective_digit(DigitLabel::Digit(7), 1, &[0], &[0, 4, 5]),
            7
        );
    }
}
