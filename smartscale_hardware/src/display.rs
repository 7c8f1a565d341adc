use smartscale_traits::{BoxError, Display};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::HwError;

pub const LCD_COLS: usize = 16;
pub const LCD_ROWS: usize = 2;

#[derive(Debug)]
struct Lcd {
    rows: [Vec<char>; LCD_ROWS],
    cursor: (usize, usize),
    backlight: bool,
    history: Vec<String>,
}

impl Default for Lcd {
    fn default() -> Self {
        Self {
            rows: [vec![' '; LCD_COLS], vec![' '; LCD_COLS]],
            cursor: (0, 0),
            backlight: true,
            history: Vec::new(),
        }
    }
}

/// 16x2 character LCD simulated in memory. Clones share the same screen.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDisplay {
    lcd: Arc<Mutex<Lcd>>,
}

impl SimulatedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lcd(&self) -> MutexGuard<'_, Lcd> {
        self.lcd.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Text on `row` with trailing blanks trimmed.
    pub fn row_text(&self, row: usize) -> String {
        self.lcd()
            .rows
            .get(row)
            .map(|r| r.iter().collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }

    pub fn is_backlit(&self) -> bool {
        self.lcd().backlight
    }

    /// Every string printed since construction, in order.
    pub fn history(&self) -> Vec<String> {
        self.lcd().history.clone()
    }
}

impl Display for SimulatedDisplay {
    fn clear(&mut self) -> Result<(), BoxError> {
        let mut lcd = self.lcd();
        for row in lcd.rows.iter_mut() {
            row.iter_mut().for_each(|c| *c = ' ');
        }
        lcd.cursor = (0, 0);
        Ok(())
    }

    fn print(&mut self, text: &str) -> Result<(), BoxError> {
        let mut lcd = self.lcd();
        let (mut col, row) = lcd.cursor;
        for ch in text.chars() {
            if col >= LCD_COLS {
                break;
            }
            lcd.rows[row][col] = ch;
            col += 1;
        }
        lcd.cursor = (col, row);
        lcd.history.push(text.to_string());
        tracing::debug!(row, text, "lcd print");
        Ok(())
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), BoxError> {
        let (col, row) = (usize::from(col), usize::from(row));
        if row >= LCD_ROWS || col >= LCD_COLS {
            return Err(Box::new(HwError::I2c(format!(
                "cursor ({col},{row}) outside {LCD_COLS}x{LCD_ROWS}"
            ))));
        }
        self.lcd().cursor = (col, row);
        Ok(())
    }

    fn backlight_on(&mut self) -> Result<(), BoxError> {
        self.lcd().backlight = true;
        Ok(())
    }

    fn backlight_off(&mut self) -> Result<(), BoxError> {
        self.lcd().backlight = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_at_cursor_and_truncates() {
        let mut lcd = SimulatedDisplay::new();
        lcd.set_cursor(0, 1).unwrap();
        lcd.print("a very long line of text").unwrap();
        assert_eq!(lcd.row_text(1), "a very long line");
        assert_eq!(lcd.row_text(0), "");
    }

    #[test]
    fn clear_blanks_both_rows() {
        let mut lcd = SimulatedDisplay::new();
        lcd.print("hello").unwrap();
        lcd.clear().unwrap();
        assert_eq!(lcd.row_text(0), "");
        assert_eq!(lcd.history(), vec!["hello".to_string()]);
    }

    #[test]
    fn cursor_outside_screen_is_rejected() {
        let mut lcd = SimulatedDisplay::new();
        assert!(lcd.set_cursor(0, 2).is_err());
        lcd.backlight_off().unwrap();
        assert!(!lcd.is_backlit());
    }
}
