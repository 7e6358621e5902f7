//! Minimal comma separated codec for session files. Quoting follows the usual rules: a field
//! containing a comma, quote or line break is wrapped in quotes with inner quotes doubled.

pub fn escape_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// A row with the (1-based) line it starts on.
#[derive(Debug, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RecordError {
    pub line: usize,
    pub reason: &'static str,
}

/// Splits file contents into records. Blank lines are skipped.
pub fn parse_records(content: &str) -> Result<Vec<Record>, RecordError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut record_line = 1;

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            '"' => {
                return Err(RecordError {
                    line,
                    reason: "unexpected quote inside an unquoted field",
                });
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if !fields.is_empty() || !field.is_empty() || quoted {
                    fields.push(std::mem::take(&mut field));
                    records.push(Record {
                        line: record_line,
                        fields: std::mem::take(&mut fields),
                    });
                }
                quoted = false;
                line += 1;
                record_line = line;
            }
            _ if quoted => {
                return Err(RecordError {
                    line,
                    reason: "unexpected characters after a closing quote",
                });
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(RecordError {
            line: record_line,
            reason: "unterminated quoted field",
        });
    }
    if !fields.is_empty() || !field.is_empty() || quoted {
        fields.push(field);
        records.push(Record {
            line: record_line,
            fields,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(record: &Record) -> Vec<&str> {
        record.fields.iter().map(String::as_str).collect()
    }

    #[test]
    fn escape_plain() {
        assert_eq!(escape_field("hello"), "hello");
    }

    #[test]
    fn escape_comma_and_quotes() {
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn parses_plain_rows() {
        let records = parse_records("start,end,project,task\n1,2,p,t\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(fields(&records[1]), ["1", "2", "p", "t"]);
        assert_eq!(records[1].line, 2);
    }

    #[test]
    fn parses_quoted_fields_across_lines() {
        let records =
            parse_records("1,2,\"a, b\",\"two\nlines \"\"quoted\"\"\"\r\n3,4,,x").unwrap();
        assert_eq!(fields(&records[0]), ["1", "2", "a, b", "two\nlines \"quoted\""]);
        assert_eq!(records[1].line, 3);
        assert_eq!(fields(&records[1]), ["3", "4", "", "x"]);
    }

    #[test]
    fn skips_blank_lines() {
        let records = parse_records("\n1,2\n\n3,4\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].line, 4);
    }

    #[test]
    fn rejects_unterminated_quote() {
        let error = parse_records("1,2\n3,\"open\n").unwrap_err();
        assert_eq!(error.line, 2);
    }

    #[test]
    fn rejects_stray_quote() {
        assert!(parse_records("1,ab\"c\n").is_err());
        assert!(parse_records("1,\"ab\"c\n").is_err());
    }
}
