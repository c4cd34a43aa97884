//! Fractional order keys over a base-62 alphabet.
//!
//! A key is an integer part (variable length, signalled by its head
//! character) followed by an optional fraction. Keys sort lexicographically,
//! and [`key_between`] can always produce a key strictly between any two
//! existing keys, so inserting or reordering a sibling never requires
//! rewriting other siblings' keys. The first key ever allocated is `a0`.

use crate::error::{GraphError, GraphResult};

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// The smallest representable integer part. Keys may never reach it, so a
/// key before any existing key can always be allocated.
const SMALLEST_INTEGER: &str = "A00000000000000000000000000";

fn digit_index(c: u8) -> GraphResult<usize> {
    DIGITS
        .iter()
        .position(|d| *d == c)
        .ok_or_else(|| GraphError::InvalidOrderKey(format!("invalid digit {:?}", c as char)))
}

/// Length of the integer part, encoded in the head character: `a`..`z` for
/// positive integers of growing magnitude, `Z`..`A` for negative.
fn integer_length(head: u8) -> GraphResult<usize> {
    match head {
        b'a'..=b'z' => Ok((head - b'a') as usize + 2),
        b'A'..=b'Z' => Ok((b'Z' - head) as usize + 2),
        _ => Err(GraphError::InvalidOrderKey(format!(
            "invalid integer head {:?}",
            head as char
        ))),
    }
}

fn integer_part(key: &str) -> GraphResult<&str> {
    let head = *key
        .as_bytes()
        .first()
        .ok_or_else(|| GraphError::InvalidOrderKey("empty key".to_string()))?;
    let len = integer_length(head)?;
    if key.len() < len {
        return Err(GraphError::InvalidOrderKey(format!(
            "integer part of {key:?} is truncated"
        )));
    }
    Ok(&key[..len])
}

/// Validate a key: well-formed integer part, no trailing zero in the
/// fraction, and not the unreachable smallest integer.
pub fn validate_order_key(key: &str) -> GraphResult<()> {
    if key == SMALLEST_INTEGER {
        return Err(GraphError::InvalidOrderKey(format!(
            "{key:?} is reserved"
        )));
    }
    let integer = integer_part(key)?;
    let fraction = &key[integer.len()..];
    if fraction.ends_with('0') {
        return Err(GraphError::InvalidOrderKey(format!(
            "fraction of {key:?} has a trailing zero"
        )));
    }
    for c in key.bytes().skip(1) {
        digit_index(c)?;
    }
    Ok(())
}

/// A digit string strictly between `a` and `b` (`b = None` means no upper
/// bound). `a` may be empty; neither may have a trailing zero.
fn midpoint(a: &str, b: Option<&str>) -> GraphResult<String> {
    if let Some(b) = b {
        // Strip the shared prefix, padding `a` with zeros.
        let a_bytes = a.as_bytes();
        let b_bytes = b.as_bytes();
        let mut n = 0;
        while n < b_bytes.len() && a_bytes.get(n).copied().unwrap_or(b'0') == b_bytes[n] {
            n += 1;
        }
        if n > 0 {
            let a_tail = if n <= a.len() { &a[n..] } else { "" };
            return Ok(format!("{}{}", &b[..n], midpoint(a_tail, Some(&b[n..]))?));
        }
    }
    let digit_a = match a.as_bytes().first() {
        Some(c) => digit_index(*c)?,
        None => 0,
    };
    let digit_b = match b.and_then(|b| b.as_bytes().first()) {
        Some(c) => digit_index(*c)?,
        None => DIGITS.len(),
    };
    if digit_b - digit_a > 1 {
        let mid = (digit_a + digit_b + 1) / 2;
        return Ok((DIGITS[mid] as char).to_string());
    }
    // Consecutive digits.
    if let Some(b) = b {
        if b.len() > 1 {
            return Ok(b[..1].to_string());
        }
    }
    Ok(format!(
        "{}{}",
        DIGITS[digit_a] as char,
        midpoint(if a.is_empty() { "" } else { &a[1..] }, None)?
    ))
}

fn increment_integer(x: &str) -> GraphResult<Option<String>> {
    let head = x.as_bytes()[0];
    let mut digits: Vec<u8> = x.bytes().skip(1).collect();
    let mut carry = true;
    for d in digits.iter_mut().rev() {
        if !carry {
            break;
        }
        let next = digit_index(*d)? + 1;
        if next == DIGITS.len() {
            *d = b'0';
        } else {
            *d = DIGITS[next];
            carry = false;
        }
    }
    if carry {
        if head == b'Z' {
            return Ok(Some("a0".to_string()));
        }
        if head == b'z' {
            return Ok(None);
        }
        let next_head = head + 1;
        if next_head > b'a' {
            digits.push(b'0');
        } else {
            digits.pop();
        }
        let mut out = vec![next_head];
        out.extend_from_slice(&digits);
        return Ok(Some(String::from_utf8(out).expect("ascii digits")));
    }
    let mut out = vec![head];
    out.extend_from_slice(&digits);
    Ok(Some(String::from_utf8(out).expect("ascii digits")))
}

fn decrement_integer(x: &str) -> GraphResult<Option<String>> {
    let head = x.as_bytes()[0];
    let mut digits: Vec<u8> = x.bytes().skip(1).collect();
    let mut borrow = true;
    for d in digits.iter_mut().rev() {
        if !borrow {
            break;
        }
        match digit_index(*d)?.checked_sub(1) {
            None => {
                *d = *DIGITS.last().expect("non-empty alphabet");
            }
            Some(prev) => {
                *d = DIGITS[prev];
                borrow = false;
            }
        }
    }
    if borrow {
        if head == b'a' {
            return Ok(Some(format!(
                "Z{}",
                *DIGITS.last().expect("non-empty alphabet") as char
            )));
        }
        if head == b'A' {
            return Ok(None);
        }
        let next_head = head - 1;
        if next_head < b'Z' {
            digits.push(*DIGITS.last().expect("non-empty alphabet"));
        } else {
            digits.pop();
        }
        let mut out = vec![next_head];
        out.extend_from_slice(&digits);
        return Ok(Some(String::from_utf8(out).expect("ascii digits")));
    }
    let mut out = vec![head];
    out.extend_from_slice(&digits);
    Ok(Some(String::from_utf8(out).expect("ascii digits")))
}

/// Allocate a key strictly between `a` and `b`.
///
/// `None` means unbounded on that side: `key_between(None, None)` returns
/// the canonical first key `a0`; `key_between(None, Some(k))` a key before
/// `k`; `key_between(Some(k), None)` a key after `k`.
pub fn key_between(a: Option<&str>, b: Option<&str>) -> GraphResult<String> {
    if let Some(a) = a {
        validate_order_key(a)?;
    }
    if let Some(b) = b {
        validate_order_key(b)?;
    }
    if let (Some(a), Some(b)) = (a, b) {
        if a >= b {
            return Err(GraphError::InvalidOrderKey(format!(
                "{a:?} is not before {b:?}"
            )));
        }
    }
    match (a, b) {
        (None, None) => Ok("a0".to_string()),
        (None, Some(b)) => {
            let integer = integer_part(b)?;
            let fraction = &b[integer.len()..];
            if integer == SMALLEST_INTEGER {
                return Ok(format!("{}{}", integer, midpoint("", Some(fraction))?));
            }
            if integer < b {
                return Ok(integer.to_string());
            }
            decrement_integer(integer)?.ok_or_else(|| {
                GraphError::InvalidOrderKey("no key before the smallest integer".to_string())
            })
        }
        (Some(a), None) => {
            let integer = integer_part(a)?;
            let fraction = &a[integer.len()..];
            match increment_integer(integer)? {
                Some(next) => Ok(next),
                None => Ok(format!("{}{}", integer, midpoint(fraction, None)?)),
            }
        }
        (Some(a), Some(b)) => {
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ia == ib {
                return Ok(format!("{}{}", ia, midpoint(fa, Some(fb))?));
            }
            let next = increment_integer(ia)?.ok_or_else(|| {
                GraphError::InvalidOrderKey("no key after the largest integer".to_string())
            })?;
            if next.as_str() < b {
                Ok(next)
            } else {
                Ok(format!("{}{}", ia, midpoint(fa, None)?))
            }
        }
    }
}
