use thiserror::Error;

/// 表示文件目前使用的行尾樣式。 / Represents the current line ending style for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    /// 回傳序列化文字時使用的行尾字串。 / Returns the literal string representation used when serialising text.
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// 文字緩衝操作錯誤。 / Error conditions exposed by the text buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextError {
    #[error("line {line} not found (document has {len} lines)")]
    LineNotFound { line: usize, len: usize },
    #[error("line range {start}..{end} is out of bounds (document has {len} lines)")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },
}

/// 以行序列為單位的純文字文件模型。 / In-memory text document modelled as an ordered sequence of lines.
///
/// 行尾樣式於載入時偵測並在序列化時還原，使 load→save 無損。 /
/// The line ending is detected at load time and restored when serialising,
/// keeping the load→save round trip lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    lines: Vec<String>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl TextDocument {
    /// 建立空文件。 / Creates an empty document.
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            line_ending: LineEnding::Lf,
            trailing_newline: true,
        }
    }

    /// 從原始文字建立文件，行尾記號會被正規化並記錄。 / Builds a document from raw text, recording and normalising the line ending.
    pub fn from_content(content: &str) -> Self {
        if content.is_empty() {
            return Self::new();
        }
        let line_ending = detect_line_ending(content);
        let normalized = normalize_newlines(content);
        let trailing_newline = normalized.ends_with('\n');
        let mut lines: Vec<String> = normalized.split('\n').map(str::to_string).collect();
        if trailing_newline {
            // split 會在結尾換行後多出一個空字串。 / split leaves a trailing empty entry after the final newline.
            lines.pop();
        }
        Self {
            lines,
            line_ending,
            trailing_newline,
        }
    }

    /// 以偵測到的行尾樣式重組文字。 / Reassembles the text using the detected line ending.
    pub fn serialize(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut out = self.lines.join(self.line_ending.as_str());
        if self.trailing_newline {
            out.push_str(self.line_ending.as_str());
        }
        out
    }

    /// 取得所有行。 / Returns all lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// 取得行尾樣式。 / Returns the line ending preference.
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// 在 1-based 位置插入一行；位置可為 len+1（附加於結尾）。 / Inserts a line at a 1-based position; `len + 1` appends at the end.
    pub fn insert_line(&mut self, line: usize, text: impl Into<String>) -> Result<(), TextError> {
        let len = self.lines.len();
        if line == 0 || line > len + 1 {
            return Err(TextError::LineNotFound { line, len });
        }
        self.lines.insert(line - 1, text.into());
        Ok(())
    }

    /// 附加一行於文件結尾。 / Appends a line at the end of the document.
    pub fn append_line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// 移除 1-based 位置的一行並回傳其內容。 / Removes the line at a 1-based position, returning its contents.
    pub fn remove_line(&mut self, line: usize) -> Result<String, TextError> {
        let len = self.lines.len();
        if line == 0 || line > len {
            return Err(TextError::LineNotFound { line, len });
        }
        Ok(self.lines.remove(line - 1))
    }

    /// 取得 1-based 位置的一行。 / Returns the line at a 1-based position.
    pub fn line(&self, line: usize) -> Result<&str, TextError> {
        let len = self.lines.len();
        self.lines
            .get(line.wrapping_sub(1))
            .map(String::as_str)
            .ok_or(TextError::LineNotFound { line, len })
    }

    /// 以新行序列取代 `[start, start+count)` 的行範圍，回傳被取代的舊行。 /
    /// Replaces the 1-based line range `[start, start+count)` with new lines,
    /// returning the replaced lines so the caller can reconstruct the inverse.
    pub fn replace_range(
        &mut self,
        start: usize,
        count: usize,
        new_lines: Vec<String>,
    ) -> Result<Vec<String>, TextError> {
        let len = self.lines.len();
        if start == 0 || start + count > len + 1 {
            return Err(TextError::RangeOutOfBounds {
                start,
                end: start + count,
                len,
            });
        }
        let removed: Vec<String> = self
            .lines
            .splice(start - 1..start - 1 + count, new_lines)
            .collect();
        Ok(removed)
    }
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// 掃描原始文字找到第一個換行記號以推斷行尾偏好。 / Scans the raw text for the first newline sentinel to infer the preferred line ending.
fn detect_line_ending(text: &str) -> LineEnding {
    let bytes = text.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\r' => {
                if idx + 1 < bytes.len() && bytes[idx + 1] == b'\n' {
                    return LineEnding::CrLf;
                }
                return LineEnding::Cr;
            }
            b'\n' => return LineEnding::Lf,
            _ => {
                idx += 1;
                continue;
            }
        }
    }
    LineEnding::Lf
}

fn normalize_newlines(input: &str) -> String {
    // 將 CRLF 與 CR 轉成 LF，簡化記憶體儲存。 / Convert CRLF and CR sequences to LF for internal storage simplicity.
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                result.push('\n');
            }
            _ => result.push(ch),
        }
    }
    result
}
