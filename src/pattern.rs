use crate::loader::LoadError;

/// Pattern used for numbered series when the caller gives a prefix but no
/// pattern of their own.
pub const DEFAULT_PATTERN: &str = "%s%04d.png";

/// Expand a printf-style series pattern. `%s` is replaced by the prefix,
/// `%d` (with optional zero padding and width, e.g. `%04d`) by the slice
/// index, and `%%` by a literal percent sign.
pub fn expand(pattern: &str, prefix: &str, index: i32) -> Result<String, LoadError> {
    let mut out = String::with_capacity(pattern.len() + prefix.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') => {
                chars.next();
                out.push_str(prefix);
            }
            _ => {
                let mut zero_pad = false;
                if chars.peek() == Some(&'0') {
                    zero_pad = true;
                    chars.next();
                }
                let mut width = 0usize;
                while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                    width = width * 10 + d as usize;
                    chars.next();
                }
                match chars.next() {
                    Some('d') => {
                        if zero_pad {
                            out.push_str(&format!("{:0width$}", index, width = width));
                        } else {
                            out.push_str(&format!("{:width$}", index, width = width));
                        }
                    }
                    other => {
                        return Err(LoadError::BadPattern {
                            pattern: pattern.to_string(),
                            reason: match other {
                                Some(c) => format!("unsupported conversion '%{}'", c),
                                None => "dangling '%' at end of pattern".to_string(),
                            },
                        });
                    }
                }
            }
        }
    }

    Ok(out)
}
