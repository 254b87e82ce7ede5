use std::fmt;

/// Where a character sits in the decoded input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Number of characters decoded before this one.
    pub offset: usize,
}

impl Position {
    /// The position of the first character of an input.
    pub fn new() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    pub fn at(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// The position of the character following `ch`, if `ch` sits at `self`.
    pub fn after(self, ch: char) -> Self {
        if ch == '\n' {
            Self {
                line: self.line + 1,
                column: 1,
                offset: self.offset + 1,
            }
        } else {
            Self {
                line: self.line,
                column: self.column + 1,
                offset: self.offset + 1,
            }
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line:{},Col:{}", self.line, self.column)
    }
}

#[test]
fn test_position_after() {
    let pos = Position::new().after('a').after('b');
    assert_eq!(pos, Position::at(1, 3, 2));

    let pos = pos.after('\n');
    assert_eq!(pos, Position::at(2, 1, 3));
    assert_eq!(pos.to_string(), "Line:2,Col:1");
}
