//! `HH[:]MM[[:]SS]` scanning.

/// Time of day as written after `AT`. Seconds are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    pub second: Option<u32>,
}

impl TimeOfDay {
    /// Parse and range-check a time token. Colons are optional between groups.
    pub(crate) fn parse(token: &str) -> Result<Self, String> {
        let mut rest = token;

        let hour = take_pair(&mut rest).ok_or_else(|| format!("expected HH in '{token}'"))?;
        skip_colon(&mut rest);
        let minute = take_pair(&mut rest).ok_or_else(|| format!("expected MM in '{token}'"))?;

        let second = if rest.is_empty() {
            None
        } else {
            skip_colon(&mut rest);
            let ss = take_pair(&mut rest).ok_or_else(|| format!("expected SS in '{token}'"))?;
            Some(ss)
        };

        if !rest.is_empty() {
            return Err(format!("unexpected trailing characters in '{token}'"));
        }
        if hour > 23 {
            return Err(format!("hour {hour} out of range 0-23"));
        }
        if minute > 59 {
            return Err(format!("minute {minute} out of range 0-59"));
        }
        if let Some(s) = second
            && s > 59
        {
            return Err(format!("second {s} out of range 0-59"));
        }

        Ok(Self {
            hour,
            minute,
            second,
        })
    }
}

fn take_pair(rest: &mut &str) -> Option<u32> {
    let pair = rest.get(..2)?;
    if !pair.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    *rest = &rest[2..];
    pair.parse().ok()
}

fn skip_colon(rest: &mut &str) {
    if let Some(stripped) = rest.strip_prefix(':') {
        *rest = stripped;
    }
}
