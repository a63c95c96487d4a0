use alloc::string::String;
use alloc::sync::Arc;

use cj_reflect::Type;

use super::{SerializerReader, scalar_text, unexpected};
use crate::contract::Contract;
use crate::internal::{ID, REF, Scope, TYPE, VALUES};
use crate::settings::{MetadataPropertyHandling, TypeNameHandling};
use crate::token::{JsonRead, JsonToken, TokenReader, push_property_path, read_document};
use crate::{JsonError, JsonErrorKind};

/// The metadata properties of an object.
#[derive(Default)]
pub(super) struct Metadata {
    pub id: Option<String>,
    pub type_name: Option<String>,
    pub reference: Option<String>,
    /// The reader is on the value of `$values`.
    pub values: bool,
    /// The closing token of the object follows the `$values` array on the
    /// same reader.
    pub enclosed: bool,
}

#[inline]
fn is_metadata(name: &str) -> bool {
    matches!(name, ID | REF | TYPE | VALUES)
}

impl SerializerReader<'_> {
    /// Consumes the metadata properties leading the object at the current
    /// `{`.
    ///
    /// The reader is left on the first ordinary property or the closing
    /// token, or on the value of `$values`.
    pub(super) fn read_metadata(&mut self, reader: &mut dyn JsonRead) -> Result<Metadata, JsonError> {
        let mut metadata = Metadata::default();
        self.read_or_end(reader, "reading metadata")?;
        loop {
            while matches!(reader.token(), JsonToken::Comment(_)) {
                self.read_or_end(reader, "reading metadata")?;
            }
            let JsonToken::PropertyName(name) = reader.token() else {
                return Ok(metadata);
            };
            match name.as_str() {
                REF => {
                    self.read_or_end(reader, "reading metadata")?;
                    metadata.reference = match reader.token() {
                        JsonToken::String(s) => Some(s.clone()),
                        JsonToken::Null => None,
                        _ => {
                            return Err(JsonError::new(JsonErrorKind::InvalidReference(REF), reader.path()));
                        }
                    };
                    self.read_or_end(reader, "reading metadata")?;
                    if metadata.reference.is_some() {
                        if matches!(reader.token(), JsonToken::PropertyName(_)) {
                            return Err(JsonError::new(JsonErrorKind::ReferenceWithProperties, reader.path()));
                        }
                        return Ok(metadata);
                    }
                }
                TYPE => {
                    self.read_or_end(reader, "reading metadata")?;
                    metadata.type_name = scalar_text(reader.token());
                    self.read_or_end(reader, "reading metadata")?;
                }
                ID => {
                    self.read_or_end(reader, "reading metadata")?;
                    metadata.id = scalar_text(reader.token());
                    self.read_or_end(reader, "reading metadata")?;
                }
                VALUES => {
                    self.read_or_end(reader, "reading metadata")?;
                    metadata.values = true;
                    metadata.enclosed = true;
                    return Ok(metadata);
                }
                _ => return Ok(metadata),
            }
        }
    }

    /// Buffers the object at the current `{` and takes its metadata from
    /// wherever it appears.
    ///
    /// Returns a reader over the rest: the object itself, positioned on its
    /// first property, or the `$values` array, positioned on its `[`.
    pub(super) fn read_ahead(
        &mut self,
        reader: &mut dyn JsonRead,
    ) -> Result<(TokenReader, Metadata), JsonError> {
        let depth = reader.depth();
        let path = reader.path();
        let document = read_document(reader)?;
        let serde_json::Value::Object(map) = &document else {
            return Err(unexpected(reader, "reading metadata", &reader.token().clone()));
        };

        let mut metadata = Metadata::default();
        if let Some(reference) = map.get(REF) {
            match reference {
                serde_json::Value::String(s) => {
                    if map.len() > 1 {
                        return Err(JsonError::new(JsonErrorKind::ReferenceWithProperties, path));
                    }
                    metadata.reference = Some(s.clone());
                }
                serde_json::Value::Null => {}
                _ => return Err(JsonError::new(JsonErrorKind::InvalidReference(REF), path)),
            }
        }
        metadata.type_name = map.get(TYPE).and_then(document_text);
        metadata.id = map.get(ID).and_then(document_text);

        let mut nested = match map.get(VALUES) {
            Some(values) => {
                metadata.values = true;
                let mut values_path = path;
                push_property_path(&mut values_path, VALUES);
                TokenReader::nested(values, depth + 1, values_path)
            }
            None => TokenReader::nested(&document, depth, path),
        };
        nested.read()?;
        if !metadata.values {
            nested.read()?;
        }
        Ok((nested, metadata))
    }

    /// Skips a metadata property met among ordinary ones when metadata is
    /// read ahead.
    ///
    /// Returns `true` if the property was skipped.
    pub(super) fn skip_metadata_property(
        &mut self,
        reader: &mut dyn JsonRead,
        name: &str,
    ) -> Result<bool, JsonError> {
        if self.state.settings.metadata_property_handling != MetadataPropertyHandling::ReadAhead
            || !is_metadata(name)
        {
            return Ok(false);
        }
        reader.skip()?;
        Ok(true)
    }

    /// Resolves the type named by `$type` when type names are read for the
    /// value, checking it against the declared type.
    pub(super) fn resolve_type_name(
        &self,
        reader: &dyn JsonRead,
        ty: &Type,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
        name: &str,
    ) -> Result<Option<(Type, Arc<Contract>)>, JsonError> {
        let handling = scope.type_name_handling(self.state.settings.type_name_handling);
        if handling == TypeNameHandling::None {
            return Ok(None);
        }

        let specified = match &self.state.settings.binder {
            Some(binder) => binder.bind_to_type(name).map(Type::Def),
            None => [&contract.underlying_type, &contract.created_type]
                .into_iter()
                .find(|t| t.name() == name)
                .cloned(),
        };
        let Some(specified) = specified else {
            return Err(JsonError::new(JsonErrorKind::UnknownType(String::from(name)), reader.path()));
        };
        if !ty.is_assignable_from(&specified) {
            return Err(JsonError::new(
                JsonErrorKind::IncompatibleType {
                    expected: ty.name(),
                    found: String::from(name),
                },
                reader.path(),
            ));
        }
        log::trace!("resolved type '{name}' at '{}'", reader.path());
        let contract = self.state.contract(&specified, || reader.path())?;
        Ok(Some((specified, contract)))
    }
}

fn document_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(alloc::format!("{n}")),
        serde_json::Value::Bool(b) => Some(alloc::format!("{b}")),
        _ => None,
    }
}
