use crate::{catalog::CatalogError, resp::RespValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentInfo {
    pub name: String,
    pub kind: String,
    pub optional: bool,
    pub multiple: bool,
}

/// Introspection metadata for `COMMAND DOCS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfoEntry {
    pub name: String,
    pub summary: String,
    pub since: String,
    pub group: String,
    pub complexity: String,
    pub arguments: Vec<ArgumentInfo>,
}

impl CommandInfoEntry {
    /// Parses `[name, summary, since, group, complexity, [arguments...]]`
    /// where each argument is `[name, type, [flags...]]`.
    pub(crate) fn from_resp(value: &RespValue) -> Result<Self, CatalogError> {
        let Some(fields) = value.as_array() else {
            return Err(invalid("docs entry is not an array"));
        };

        let [name, summary, since, group, complexity, arguments] = fields else {
            return Err(invalid(format!(
                "docs entry has {} fields, expected 6",
                fields.len()
            )));
        };

        let text = |value: &RespValue, field: &str| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("docs {} is not a string", field)))
        };

        let name = text(name, "name")?.to_lowercase();
        let arguments = arguments
            .as_array()
            .ok_or_else(|| invalid(format!("docs for '{}' arguments are not an array", name)))?
            .iter()
            .map(|argument| ArgumentInfo::from_resp(&name, argument))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            summary: text(summary, "summary")?,
            since: text(since, "since")?,
            group: text(group, "group")?,
            complexity: text(complexity, "complexity")?,
            name,
            arguments,
        })
    }

    /// The `COMMAND DOCS` reply body (a flat field/value map) for this entry.
    pub fn to_resp(&self) -> RespValue {
        let arguments = self
            .arguments
            .iter()
            .map(ArgumentInfo::to_resp)
            .collect::<Vec<_>>();

        let mut fields = vec![
            RespValue::bulk("summary"),
            RespValue::bulk(self.summary.clone()),
            RespValue::bulk("since"),
            RespValue::bulk(self.since.clone()),
            RespValue::bulk("group"),
            RespValue::bulk(self.group.clone()),
            RespValue::bulk("complexity"),
            RespValue::bulk(self.complexity.clone()),
        ];

        if !arguments.is_empty() {
            fields.push(RespValue::bulk("arguments"));
            fields.push(RespValue::Array(arguments));
        }

        RespValue::Array(fields)
    }
}

impl ArgumentInfo {
    fn from_resp(command: &str, value: &RespValue) -> Result<Self, CatalogError> {
        let Some([name, kind, flags]) = value.as_array() else {
            return Err(invalid(format!(
                "docs for '{}' has a malformed argument",
                command
            )));
        };

        let name = name
            .as_str()
            .ok_or_else(|| invalid(format!("docs for '{}' has an unnamed argument", command)))?;
        let kind = kind
            .as_str()
            .ok_or_else(|| invalid(format!("docs for '{}' argument '{}' has no type", command, name)))?;

        let mut argument = ArgumentInfo {
            name: name.to_string(),
            kind: kind.to_string(),
            optional: false,
            multiple: false,
        };

        for flag in flags
            .as_array()
            .ok_or_else(|| invalid(format!("docs for '{}' argument flags are not an array", command)))?
        {
            match flag.as_str() {
                Some("optional") => argument.optional = true,
                Some("multiple") => argument.multiple = true,
                _ => {
                    return Err(invalid(format!(
                        "docs for '{}' argument '{}' has an unknown flag",
                        command, argument.name
                    )))
                }
            }
        }

        Ok(argument)
    }

    fn to_resp(&self) -> RespValue {
        let mut fields = vec![
            RespValue::bulk("name"),
            RespValue::bulk(self.name.clone()),
            RespValue::bulk("type"),
            RespValue::bulk(self.kind.clone()),
        ];

        let flags = [(self.optional, "optional"), (self.multiple, "multiple")]
            .into_iter()
            .filter(|(set, _)| *set)
            .map(|(_, flag)| RespValue::simple(flag))
            .collect::<Vec<_>>();
        if !flags.is_empty() {
            fields.push(RespValue::bulk("flags"));
            fields.push(RespValue::Array(flags));
        }

        RespValue::Array(fields)
    }
}

fn invalid(reason: impl Into<String>) -> CatalogError {
    CatalogError::Invalid {
        resource: "command docs",
        reason: reason.into(),
    }
}
