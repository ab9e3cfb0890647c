use std::sync::Arc;

use bytes::Bytes;

use crate::{
    catalog::{Catalog, CommandDefinition},
    command_utils::lossy,
    commands::{self, CommandContext, CommandError},
    hook::HookContext,
    keyspace::DataStoreSet,
    resp::RespValue,
    session::ClientSession,
};

/// Resolves requests against the catalog and runs them against the
/// keyspace.
///
/// Dispatch never fails: every problem with a request, from an unknown
/// name to a handler error, comes back as an error reply.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    catalog: Arc<Catalog>,
    stores: Arc<DataStoreSet>,
}

/// A request resolved to its catalog entry.
struct Resolved<'a> {
    definition: &'a CommandDefinition,
    /// Words naming the command: 1, or 2 for a subcommand.
    name_words: usize,
}

impl CommandDispatcher {
    pub fn new(catalog: Arc<Catalog>, stores: Arc<DataStoreSet>) -> Self {
        Self { catalog, stores }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stores(&self) -> &DataStoreSet {
        &self.stores
    }

    pub async fn dispatch(&self, session: &mut ClientSession, request: RespValue) -> RespValue {
        let words = match request_words(request) {
            Ok(words) => words,
            Err(error) => return error.to_resp(),
        };

        let resolved = match self.resolve(&words) {
            Ok(resolved) => resolved,
            Err(error) => {
                tracing::debug!(client = session.id, error = %error, "request rejected");
                return error.to_resp();
            }
        };
        let definition = resolved.definition;

        let context = HookContext {
            command: &definition.name,
            request: &words,
            client_id: session.id,
            database: session.database,
        };
        let hook = self.stores.hook().current().await;

        let reply = match hook.as_ref().and_then(|hook| hook.before(&context)) {
            Some(bypass) => bypass,
            None => {
                let mut command_context = CommandContext {
                    session,
                    stores: &self.stores,
                    catalog: &self.catalog,
                };
                let arguments = &words[resolved.name_words..];

                match commands::execute(&definition.name, arguments, &mut command_context).await {
                    Ok(reply) => {
                        if definition.is_write() {
                            self.stores.mark_dirty();
                        }
                        reply
                    }
                    Err(error) => error.to_resp(),
                }
            }
        };

        if let Some(hook) = &hook {
            hook.after(&context, &reply);
        }

        reply
    }

    fn resolve<'a>(&'a self, words: &[Bytes]) -> Result<Resolved<'a>, CommandError> {
        let name = lossy(&words[0]).to_lowercase();

        let Some(definition) = self
            .catalog
            .lookup(&name)
            .filter(|_| !self.catalog.is_disabled(&name))
        else {
            return Err(unknown_command(words));
        };

        let resolved = match words.get(1) {
            Some(subcommand) if definition.has_subcommands() => {
                let compound = format!("{}|{}", name, lossy(subcommand).to_lowercase());
                match self.catalog.lookup(&compound) {
                    Some(_) if self.catalog.is_disabled(&compound) => {
                        return Err(unknown_command(words));
                    }
                    Some(definition) => Resolved {
                        definition,
                        name_words: 2,
                    },
                    None => {
                        return Err(CommandError::UnknownSubcommand {
                            command: name,
                            subcommand: lossy(subcommand),
                        })
                    }
                }
            }
            _ => Resolved {
                definition,
                name_words: 1,
            },
        };

        if !resolved.definition.arity.accepts(words.len()) {
            return Err(CommandError::WrongArity(resolved.definition.name.clone()));
        }

        Ok(resolved)
    }
}

fn unknown_command(words: &[Bytes]) -> CommandError {
    CommandError::UnknownCommand {
        name: lossy(&words[0]),
        arguments: words[1..].iter().map(|word| lossy(word)).collect(),
    }
}

/// A request must be a non-empty array of bulk strings.
fn request_words(request: RespValue) -> Result<Vec<Bytes>, CommandError> {
    let RespValue::Array(items) = request else {
        return Err(CommandError::Protocol);
    };
    if items.is_empty() {
        return Err(CommandError::Protocol);
    }

    items
        .into_iter()
        .map(|item| match item {
            RespValue::BulkString(word) => Ok(word),
            _ => Err(CommandError::Protocol),
        })
        .collect()
}
