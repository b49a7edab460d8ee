use udal_core::ConnectionDescriptor;

/// How the driver manager is asked for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource<'a> {
    /// A configured data source name, logged into with the descriptor's
    /// user and password.
    Name(&'a str),
    /// A full `KEY=VALUE;...` connection string.
    ConnectionString(String),
}

impl<'a> DataSource<'a> {
    /// A `database` holding `=` is taken as a connection string; `UID` and
    /// `PWD` are appended unless it already sets them.
    #[must_use]
    pub fn resolve(descriptor: &'a ConnectionDescriptor) -> Self {
        let database = descriptor.database.trim();
        if !database.contains('=') {
            return Self::Name(database);
        }

        let mut connection_string = database.trim_end_matches(';').to_string();
        for (key, value) in [("UID", &descriptor.user), ("PWD", &descriptor.password)] {
            if value.is_empty() || has_key(database, key) {
                continue;
            }
            connection_string.push_str(&format!(";{key}={}", quote(value)));
        }
        Self::ConnectionString(connection_string)
    }
}

fn has_key(connection_string: &str, key: &str) -> bool {
    connection_string.split(';').any(|pair| {
        pair.split_once('=')
            .is_some_and(|(name, _)| name.trim().eq_ignore_ascii_case(key))
    })
}

fn quote(value: &str) -> String {
    if value.contains([';', '{', '}']) {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use udal_core::ConnectionDescriptor;

    use super::DataSource;

    #[test]
    fn plain_names_are_data_source_names() {
        let descriptor = ConnectionDescriptor::new("ROUTER", "svc", "secret");
        assert_eq!(DataSource::resolve(&descriptor), DataSource::Name("ROUTER"));
    }

    #[test]
    fn connection_strings_gain_missing_credentials() {
        let descriptor =
            ConnectionDescriptor::new("Driver={Db2};Hostname=db;Database=ROUTER;", "svc", "p;w");
        assert_eq!(
            DataSource::resolve(&descriptor),
            DataSource::ConnectionString(
                "Driver={Db2};Hostname=db;Database=ROUTER;UID=svc;PWD={p;w}".to_string()
            )
        );
    }

    #[test]
    fn explicit_credentials_in_the_string_win() {
        let descriptor = ConnectionDescriptor::new("DSN=router;uid=admin", "svc", "secret");
        assert_eq!(
            DataSource::resolve(&descriptor),
            DataSource::ConnectionString("DSN=router;uid=admin;PWD=secret".to_string())
        );
    }
}
