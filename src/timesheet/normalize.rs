const MAX_DIGITS: usize = 4;

/// Turns raw keystrokes into a canonical (possibly partial) `HH:MM`.
///
/// Must be re-applied to the whole field on every keystroke: a digit that was
/// acceptable on its own can be dropped once the digits around it change.
/// The output is always one of `""`, `"D"`, `"DD"`, `"DD:D"` or `"DD:DD"`.
pub fn normalize(raw: &str) -> String {
    let mut accepted: Vec<u8> = Vec::with_capacity(MAX_DIGITS);

    for digit in raw
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .take(MAX_DIGITS)
    {
        if accepts(&accepted, digit) {
            accepted.push(digit);
        }
    }

    let mut out = String::with_capacity(5);
    for (idx, digit) in accepted.iter().enumerate() {
        if idx == 2 {
            out.push(':');
        }
        out.push(char::from(b'0' + digit));
    }
    out
}

fn accepts(accepted: &[u8], digit: u8) -> bool {
    match accepted.len() {
        0 => digit <= 2,
        1 if accepted[0] == 2 => digit <= 3,
        1 => true,
        2 => digit <= 5,
        3 => true,
        _ => false,
    }
}
