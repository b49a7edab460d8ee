/// What a statement text addresses in the in-memory catalog. Names are
/// upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Procedure(String),
    Select(String),
    Insert(String),
    /// `cursor` names the cursor of a `WHERE CURRENT OF` update.
    Update {
        table: String,
        positioned: bool,
        cursor: Option<String>,
    },
    Delete(String),
    Other,
}

impl Target {
    pub(crate) fn parse(sql: &str) -> Self {
        let upper = sql.trim().trim_start_matches('{').trim_start().to_ascii_uppercase();

        for prefix in ["BEGIN ", "CALL "] {
            if let Some(rest) = upper.strip_prefix(prefix) {
                return Self::Procedure(identifier(rest));
            }
        }
        if let Some(rest) = upper.strip_prefix("INSERT INTO ") {
            return Self::Insert(identifier(rest));
        }
        if let Some(rest) = upper.strip_prefix("DELETE FROM ") {
            return Self::Delete(identifier(rest));
        }
        if let Some(rest) = upper.strip_prefix("UPDATE ") {
            let cursor = upper
                .split_once("WHERE CURRENT OF ")
                .map(|(_, name)| identifier(name));
            return Self::Update {
                table: identifier(rest),
                positioned: cursor.is_some() || upper.contains("WHERE ROWID"),
                cursor,
            };
        }
        if upper.starts_with("SELECT ")
            && let Some(index) = upper.find(" FROM ")
        {
            return Self::Select(identifier(&upper[index + " FROM ".len()..]));
        }
        Self::Other
    }

    pub(crate) fn modifies_data(&self) -> bool {
        matches!(self, Self::Insert(_) | Self::Update { .. } | Self::Delete(_))
    }
}

fn identifier(text: &str) -> String {
    text.trim_start()
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '$' | '#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::Target;

    #[test]
    fn procedure_calls_resolve_for_every_call_syntax() {
        for sql in [
            "BEGIN GetServiceState(:1); END;",
            "CALL GetServiceState()",
            "{call GetServiceState(?, ?)}",
        ] {
            assert_eq!(
                Target::parse(sql),
                Target::Procedure("GETSERVICESTATE".to_string()),
                "{sql}"
            );
        }
    }

    #[test]
    fn table_statements_resolve_their_table() {
        assert_eq!(
            Target::parse("select id, doc from docs fetch first 2 rows only"),
            Target::Select("DOCS".to_string())
        );
        assert_eq!(
            Target::parse("INSERT INTO docs (id, doc) VALUES (?, ?)"),
            Target::Insert("DOCS".to_string())
        );
        assert_eq!(
            Target::parse("UPDATE docs SET doc = ? WHERE CURRENT OF SQL_CUR1"),
            Target::Update {
                table: "DOCS".to_string(),
                positioned: true,
                cursor: Some("SQL_CUR1".to_string()),
            }
        );
        assert_eq!(
            Target::parse("UPDATE docs SET doc = :1 WHERE ROWID = :ROWID_"),
            Target::Update {
                table: "DOCS".to_string(),
                positioned: true,
                cursor: None,
            }
        );
        assert_eq!(Target::parse("DELETE FROM docs"), Target::Delete("DOCS".to_string()));
        assert_eq!(Target::parse("ALTER SESSION SET x = 1"), Target::Other);
    }

    #[test]
    fn only_writes_modify_data() {
        assert!(Target::parse("DELETE FROM docs").modifies_data());
        assert!(!Target::parse("SELECT * FROM docs").modifies_data());
        assert!(!Target::parse("CALL GetServiceState()").modifies_data());
    }
}
