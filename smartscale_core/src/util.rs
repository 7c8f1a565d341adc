//! Small helpers shared by the calibration screens.

/// Character columns on the reference LCD.
pub const LCD_COLS: usize = 16;

/// Pad or truncate `text` to exactly `width` characters so a new line fully
/// overwrites the previous one.
pub fn fit_line(text: &str, width: usize) -> String {
    let mut line: String = text.chars().take(width).collect();
    let len = line.chars().count();
    line.extend(std::iter::repeat_n(' ', width - len));
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_text() {
        assert_eq!(fit_line("ok", 4), "ok  ");
    }

    #[test]
    fn truncates_long_text() {
        assert_eq!(fit_line("Place weight now", 5), "Place");
        assert_eq!(fit_line("", 3), "   ");
    }
}
