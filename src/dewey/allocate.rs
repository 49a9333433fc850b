//! Dense division allocation within one label step
//!
//! A step is the tail of a label below its parent (class marker excluded):
//! zero or more even caret divisions `>= 2` followed by one odd terminal
//! division `>= 3`. Carets never start a level; they open room between two
//! adjacent odd values. Two valid steps are never prefixes of each other,
//! so two distinct steps always differ at some division.

use super::errors::{DeweyError, DeweyResult};

/// Terminal of the first label allocated in an empty sub-range
pub const FIRST_DIVISION: u64 = 17;

/// Terminal used right after a freshly opened caret
pub const SUBDIVISION_START: u64 = 1025;

/// Smallest value a step division may take (carets)
pub const MIN_STEP_DIVISION: u64 = 2;

/// Smallest odd value a step may end with
pub const MIN_TERMINAL: u64 = 3;

fn is_terminal(division: u64) -> bool {
    division % 2 == 1
}

/// First step in an empty sub-range.
pub fn first_step() -> Vec<u64> {
    vec![FIRST_DIVISION]
}

/// Smallest single-division step following `step`.
pub fn step_after(step: &[u64]) -> DeweyResult<Vec<u64>> {
    let head = step[0];
    let increment = if is_terminal(head) { 2 } else { 1 };
    head.checked_add(increment)
        .map(|next| vec![next])
        .ok_or_else(|| DeweyError::DivisionOverflow(format!("{:?}", step)))
}

/// Closest step preceding `step`.
///
/// Stays one division long while an odd value `>= 3` is free below the head;
/// otherwise descends through the lowest caret.
pub fn step_before(step: &[u64]) -> Vec<u64> {
    let head = step[0];
    let candidate = if is_terminal(head) {
        head.checked_sub(2)
    } else {
        head.checked_sub(1)
    };

    match candidate {
        Some(value) if value >= MIN_TERMINAL => vec![value],
        _ if head == MIN_STEP_DIVISION => {
            let mut out = vec![MIN_STEP_DIVISION];
            out.extend(step_before(&step[1..]));
            out
        }
        _ => vec![MIN_STEP_DIVISION, SUBDIVISION_START],
    }
}

/// Step strictly between `left` and `right` (`left < right`).
///
/// Picks the smallest free odd value between the first differing divisions;
/// only when none exists does the result grow by a caret.
pub fn step_between(left: &[u64], right: &[u64]) -> DeweyResult<Vec<u64>> {
    let index = left
        .iter()
        .zip(right.iter())
        .position(|(l, r)| l != r)
        .ok_or_else(|| DeweyError::invalid(left, "steps are prefixes of each other"))?;

    let (low, high) = (left[index], right[index]);
    if low >= high {
        return Err(DeweyError::Unordered {
            left: format!("{:?}", left),
            right: format!("{:?}", right),
        });
    }

    let mut out = left[..index].to_vec();
    let next_odd = if is_terminal(low) { low + 2 } else { low + 1 };

    if next_odd < high {
        out.push(next_odd);
    } else if is_terminal(low) && high == low + 2 {
        out.push(low + 1);
        out.push(SUBDIVISION_START);
    } else if is_terminal(low) {
        // `high` is a caret directly above the left terminal.
        out.push(high);
        out.extend(step_before(&right[index + 1..]));
    } else {
        // `low` is a caret directly below the right terminal.
        out.push(low);
        out.extend(step_after(&left[index + 1..])?);
    }

    Ok(out)
}
