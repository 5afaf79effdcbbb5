// ==========================================
// 现场服务管理系统 - 平面记录解析器
// ==========================================
// 职责: 原始字节 → 编码探测 → 分隔符探测 → 行记录（列名 → 文本）
// 方言: 简化 CSV，非 RFC 4180
//   - 每个 `"` 仅切换"引号内"状态且本身被丢弃，不支持 `""` 转义
//   - 不支持跨行引号字段（按物理行解析）
//   - 空白行一律跳过
// ==========================================

use crate::domain::staging::RawRow;
use crate::importer::import_traits::FileParser;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Delimiter - 分隔符
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    Tab,
    Semicolon,
}

impl Delimiter {
    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
            Delimiter::Semicolon => ';',
        }
    }

    /// 按全文出现次数探测分隔符
    ///
    /// # 优先级
    /// 1. tab 次数同时大于 comma 与 semicolon → tab
    /// 2. semicolon 次数大于 comma → semicolon
    /// 3. 其他 → comma
    pub fn detect(text: &str) -> Self {
        let (mut commas, mut tabs, mut semicolons) = (0usize, 0usize, 0usize);
        for ch in text.chars() {
            match ch {
                ',' => commas += 1,
                '\t' => tabs += 1,
                ';' => semicolons += 1,
                _ => {}
            }
        }

        if tabs > commas && tabs > semicolons {
            Delimiter::Tab
        } else if semicolons > commas {
            Delimiter::Semicolon
        } else {
            Delimiter::Comma
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Comma => write!(f, "comma"),
            Delimiter::Tab => write!(f, "tab"),
            Delimiter::Semicolon => write!(f, "semicolon"),
        }
    }
}

// ==========================================
// TextEncoding - 文本编码
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Bom => "utf-8-bom",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Windows1252 => "windows-1252",
        }
    }
}

// Windows-1252 在 0x80..=0x9F 区间与 Latin-1 不同
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// 探测编码并解码为 UTF-8 文本
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return (String::from_utf8_lossy(rest).into_owned(), TextEncoding::Utf8Bom);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return (decode_utf16(rest, u16::from_le_bytes), TextEncoding::Utf16Le);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return (decode_utf16(rest, u16::from_be_bytes), TextEncoding::Utf16Be);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => {
            let text = bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                    _ => b as char,
                })
                .collect();
            (text, TextEncoding::Windows1252)
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// 按简化方言切分一行
pub fn split_line(line: &str, delimiter: Delimiter) -> Vec<String> {
    let sep = delimiter.as_char();
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == sep && !in_quotes {
            cells.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    cells.push(current.trim().to_string());

    cells
}

// ==========================================
// ParsedFile - 解析结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub encoding: TextEncoding,
    pub delimiter: Delimiter,
    pub headers: Vec<String>,
    pub records: Vec<RawRow>,
}

impl ParsedFile {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 解析已解码的文本
pub fn parse_text(text: &str, encoding: TextEncoding) -> ParsedFile {
    let delimiter = Delimiter::detect(text);

    // 表头前的空行与文件末尾的空行丢弃；中间空行保留为全空记录，保证行号与源文件位置一致
    let mut lines: Vec<&str> = text
        .lines()
        .skip_while(|line| line.trim().is_empty())
        .collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    let mut lines = lines.into_iter();
    let headers = match lines.next() {
        Some(header_line) => split_line(header_line, delimiter),
        None => Vec::new(),
    };

    let records = lines
        .map(|line| {
            let cells = split_line(line, delimiter);
            headers
                .iter()
                .enumerate()
                .map(|(idx, header)| (header.clone(), cells.get(idx).cloned().unwrap_or_default()))
                .collect::<RawRow>()
        })
        .collect();

    ParsedFile {
        encoding,
        delimiter,
        headers,
        records,
    }
}

// ==========================================
// DelimitedTextParser - 分隔文本解析器
// ==========================================
pub struct DelimitedTextParser;

impl FileParser for DelimitedTextParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ParsedFile {
        let (text, encoding) = decode_text(bytes);
        parse_text(&text, encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_file() {
        let parser = DelimitedTextParser;
        let parsed = parser.parse_bytes(b"Name,Email\nAcme,a@acme.com\nBeta,b@beta.io\n");

        assert_eq!(parsed.delimiter, Delimiter::Comma);
        assert_eq!(parsed.encoding, TextEncoding::Utf8);
        assert_eq!(parsed.headers, vec!["Name", "Email"]);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].get("Email"), Some(&"b@beta.io".to_string()));
    }

    #[test]
    fn test_record_count_matches_lines_and_keys_match_header() {
        let text = "A\tB\tC\n1\t2\n4\t5\t6\n\n\n";
        let parsed = parse_text(text, TextEncoding::Utf8);

        assert_eq!(parsed.delimiter, Delimiter::Tab);
        assert_eq!(parsed.records.len(), 2);
        for record in &parsed.records {
            let mut keys: Vec<_> = record.keys().cloned().collect();
            keys.sort();
            assert_eq!(keys, vec!["A", "B", "C"]);
        }
        // 缺失单元格补空串
        assert_eq!(parsed.records[0].get("C"), Some(&String::new()));
    }

    #[test]
    fn test_interior_blank_line_kept_as_empty_record() {
        let text = "\n\nName,Email\nAcme,a@acme.com\n\nBeta,b@beta.io\n\n";
        let parsed = parse_text(text, TextEncoding::Utf8);

        assert_eq!(parsed.headers, vec!["Name", "Email"]);
        assert_eq!(parsed.records.len(), 3);
        assert_eq!(parsed.records[0].get("Name").map(String::as_str), Some("Acme"));
        assert!(parsed.records[1].values().all(|v| v.is_empty()));
        assert_eq!(parsed.records[2].get("Name").map(String::as_str), Some("Beta"));
    }

    #[test]
    fn test_delimiter_precedence() {
        // tab 必须同时多于 comma 和 semicolon
        assert_eq!(Delimiter::detect("a\tb\tc,d"), Delimiter::Tab);
        assert_eq!(Delimiter::detect("a\tb,c,d"), Delimiter::Comma);
        // 平局时 comma 胜出
        assert_eq!(Delimiter::detect("a;b,c"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("a;b;c,d"), Delimiter::Semicolon);
        assert_eq!(Delimiter::detect("no delimiters"), Delimiter::Comma);
    }

    #[test]
    fn test_quotes_toggle_and_are_stripped() {
        let cells = split_line(r#""Smith, John","  5 Main St ",x"#, Delimiter::Comma);
        assert_eq!(cells, vec!["Smith, John", "5 Main St", "x"]);

        // 简化方言: 内部引号不转义，只切换状态
        let cells = split_line(r#"say "hi, there" now,next"#, Delimiter::Comma);
        assert_eq!(cells, vec!["say hi, there now", "next"]);
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let parsed = parse_text("Name,Email\n\n", TextEncoding::Utf8);
        assert!(parsed.is_empty());
        assert_eq!(parsed.headers.len(), 2);

        let parsed = parse_text("", TextEncoding::Utf8);
        assert!(parsed.is_empty());
        assert!(parsed.headers.is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let parsed = parse_text("Name,City\r\nAcme,Austin\r\n", TextEncoding::Utf8);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].get("City"), Some(&"Austin".to_string()));
    }

    #[test]
    fn test_decode_bom_and_fallback() {
        let (text, enc) = decode_text(b"\xEF\xBB\xBFName\nA");
        assert_eq!(enc, TextEncoding::Utf8Bom);
        assert_eq!(text, "Name\nA");

        let (text, enc) = decode_text(&[0xFF, 0xFE, b'H', 0, b'i', 0]);
        assert_eq!(enc, TextEncoding::Utf16Le);
        assert_eq!(text, "Hi");

        // 0xE9 = é (Latin-1), 0x80 = €
        let (text, enc) = decode_text(&[b'C', b'a', b'f', 0xE9, b' ', 0x80]);
        assert_eq!(enc, TextEncoding::Windows1252);
        assert_eq!(text, "Café €");
    }
}
