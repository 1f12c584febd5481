//! Typed projections of parsed rows
//!
//! Rows stay loosely typed until the loader is about to write them. At that
//! point each row is turned into an [`EntityRecord`] and its foreign business
//! keys are resolved against the [`KeyMap`].

use super::csv::ParsedRow;
use super::error::RowFailure;
use super::key_resolver::KeyMap;
use super::types::{DatasetKind, EntityType};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const KEY: &str = "key";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const PROGRAM_KEY: &str = "programKey";
pub const CHAPTER_KEY: &str = "chapterKey";
pub const SEQUENCE: &str = "sequence";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramChapterRecord {
    pub program_key: String,
    pub chapter_key: String,
    pub program_id: Uuid,
    pub chapter_id: Uuid,
    pub sequence: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTemplateRecord {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub program_key: String,
    pub chapter_key: Option<String>,
    pub program_id: Uuid,
    pub program_chapter_id: Option<Uuid>,
}

/// A row ready to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRecord {
    Program(ProgramRecord),
    Chapter(ChapterRecord),
    ProgramChapter(ProgramChapterRecord),
    ProductTemplate(ProductTemplateRecord),
}

impl EntityRecord {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityRecord::Program(_) => EntityType::Program,
            EntityRecord::Chapter(_) => EntityType::Chapter,
            EntityRecord::ProgramChapter(_) => EntityType::ProgramChapter,
            EntityRecord::ProductTemplate(_) => EntityType::ProductTemplate,
        }
    }

    pub fn business_key(&self) -> String {
        match self {
            EntityRecord::Program(r) => r.key.clone(),
            EntityRecord::Chapter(r) => r.key.clone(),
            EntityRecord::ProgramChapter(r) => program_chapter_key(&r.program_key, &r.chapter_key),
            EntityRecord::ProductTemplate(r) => r.key.clone(),
        }
    }

    /// Key the inserted record is registered under in the [`KeyMap`]
    ///
    /// Junctions are keyed by their resolved parent ids, so business keys
    /// that contain `:` cannot alias another pair.
    pub fn registry_key(&self) -> String {
        match self {
            EntityRecord::ProgramChapter(r) => junction_key(r.program_id, r.chapter_id),
            other => other.business_key(),
        }
    }

    /// Build the record for `row`, resolving foreign keys through `keys`
    pub fn from_row(
        dataset: DatasetKind,
        row: &ParsedRow,
        keys: &KeyMap,
    ) -> Result<Self, RowFailure> {
        match dataset {
            DatasetKind::Programs => Ok(EntityRecord::Program(ProgramRecord {
                key: required(row, KEY)?,
                name: required(row, NAME)?,
                description: optional(row, DESCRIPTION),
            })),
            DatasetKind::Chapters => Ok(EntityRecord::Chapter(ChapterRecord {
                key: required(row, KEY)?,
                name: required(row, NAME)?,
                description: optional(row, DESCRIPTION),
            })),
            DatasetKind::ProgramChapters => {
                let program_key = required(row, PROGRAM_KEY)?;
                let chapter_key = required(row, CHAPTER_KEY)?;
                let sequence = match row.get(SEQUENCE) {
                    Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                        RowFailure::ConstraintViolation(format!(
                            "sequence '{}' is not an integer",
                            raw
                        ))
                    })?),
                    None => None,
                };
                let program_id = resolve(keys, EntityType::Program, &program_key)?;
                let chapter_id = resolve(keys, EntityType::Chapter, &chapter_key)?;
                Ok(EntityRecord::ProgramChapter(ProgramChapterRecord {
                    program_key,
                    chapter_key,
                    program_id,
                    chapter_id,
                    sequence,
                }))
            }
            DatasetKind::ProductTemplates => {
                let key = required(row, KEY)?;
                let name = required(row, NAME)?;
                let program_key = required(row, PROGRAM_KEY)?;
                let chapter_key = optional(row, CHAPTER_KEY);
                let program_id = resolve(keys, EntityType::Program, &program_key)?;
                let program_chapter_id = match &chapter_key {
                    Some(chapter_key) => Some(
                        keys.lookup(EntityType::Chapter, chapter_key)
                            .and_then(|chapter_id| {
                                keys.lookup(
                                    EntityType::ProgramChapter,
                                    &junction_key(program_id, chapter_id),
                                )
                            })
                            .ok_or_else(|| RowFailure::UnresolvedReference {
                                entity: EntityType::ProgramChapter,
                                key: program_chapter_key(&program_key, chapter_key),
                            })?,
                    ),
                    None => None,
                };
                Ok(EntityRecord::ProductTemplate(ProductTemplateRecord {
                    key,
                    name,
                    description: optional(row, DESCRIPTION),
                    program_key,
                    chapter_key,
                    program_id,
                    program_chapter_id,
                }))
            }
        }
    }
}

/// Business key of a row as read from the file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Single(String),
    Pair { program_key: String, chapter_key: String },
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Single(key) => f.write_str(key),
            RowKey::Pair {
                program_key,
                chapter_key,
            } => f.write_str(&program_chapter_key(program_key, chapter_key)),
        }
    }
}

/// Business key of a row without building the whole record
pub fn business_key_of(dataset: DatasetKind, row: &ParsedRow) -> Option<RowKey> {
    match dataset {
        DatasetKind::ProgramChapters => Some(RowKey::Pair {
            program_key: row.get(PROGRAM_KEY)?.to_string(),
            chapter_key: row.get(CHAPTER_KEY)?.to_string(),
        }),
        _ => row.get(KEY).map(|key| RowKey::Single(key.to_string())),
    }
}

/// Display form of a program/chapter pair, used in messages and reports
pub fn program_chapter_key(program_key: &str, chapter_key: &str) -> String {
    format!("{}:{}", program_key, chapter_key)
}

/// Registry key of the junction between two inserted parents
pub fn junction_key(program_id: Uuid, chapter_id: Uuid) -> String {
    format!("{}:{}", program_id, chapter_id)
}

fn required(row: &ParsedRow, field: &str) -> Result<String, RowFailure> {
    row.get(field)
        .map(str::to_string)
        .ok_or_else(|| RowFailure::missing_field(field))
}

fn optional(row: &ParsedRow, field: &str) -> Option<String> {
    row.get(field).map(str::to_string)
}

fn resolve(keys: &KeyMap, entity: EntityType, key: &str) -> Result<Uuid, RowFailure> {
    keys.lookup(entity, key)
        .ok_or_else(|| RowFailure::UnresolvedReference {
            entity,
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::csv::parse;

    fn row(text: &str) -> ParsedRow {
        parse(text).remove(0)
    }

    #[test]
    fn test_program_record() {
        let record = EntityRecord::from_row(
            DatasetKind::Programs,
            &row("key,name,description\nP1,Algebra,"),
            &KeyMap::new(),
        )
        .unwrap();

        assert_eq!(
            record,
            EntityRecord::Program(ProgramRecord {
                key: "P1".into(),
                name: "Algebra".into(),
                description: None,
            })
        );
        assert_eq!(record.business_key(), "P1");
    }

    #[test]
    fn test_missing_required_field() {
        let err = EntityRecord::from_row(
            DatasetKind::Chapters,
            &row("key,name\nC1,"),
            &KeyMap::new(),
        )
        .unwrap_err();
        assert_eq!(err, RowFailure::missing_field(NAME));
    }

    #[test]
    fn test_program_chapter_resolves_both_parents() {
        let mut keys = KeyMap::new();
        let program_id = Uuid::new_v4();
        let chapter_id = Uuid::new_v4();
        keys.register(EntityType::Program, "P1", program_id).unwrap();
        keys.register(EntityType::Chapter, "C1", chapter_id).unwrap();

        let record = EntityRecord::from_row(
            DatasetKind::ProgramChapters,
            &row("programKey,chapterKey,sequence\nP1,C1,3"),
            &keys,
        )
        .unwrap();

        match &record {
            EntityRecord::ProgramChapter(r) => {
                assert_eq!(r.program_id, program_id);
                assert_eq!(r.chapter_id, chapter_id);
                assert_eq!(r.sequence, Some(3));
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(record.business_key(), "P1:C1");
    }

    #[test]
    fn test_program_chapter_with_unknown_chapter() {
        let mut keys = KeyMap::new();
        keys.register(EntityType::Program, "P1", Uuid::new_v4()).unwrap();

        let err = EntityRecord::from_row(
            DatasetKind::ProgramChapters,
            &row("programKey,chapterKey\nP1,C1"),
            &keys,
        )
        .unwrap_err();
        assert_eq!(
            err,
            RowFailure::UnresolvedReference {
                entity: EntityType::Chapter,
                key: "C1".into()
            }
        );
    }

    #[test]
    fn test_bad_sequence() {
        let err = EntityRecord::from_row(
            DatasetKind::ProgramChapters,
            &row("programKey,chapterKey,sequence\nP1,C1,first"),
            &KeyMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RowFailure::ConstraintViolation(_)));
    }

    #[test]
    fn test_product_template_with_chapter_uses_junction() {
        let mut keys = KeyMap::new();
        let program_id = Uuid::new_v4();
        let chapter_id = Uuid::new_v4();
        let junction_id = Uuid::new_v4();
        keys.register(EntityType::Program, "P1", program_id).unwrap();
        keys.register(EntityType::Chapter, "C1", chapter_id).unwrap();
        keys.register(
            EntityType::ProgramChapter,
            junction_key(program_id, chapter_id),
            junction_id,
        )
        .unwrap();

        let record = EntityRecord::from_row(
            DatasetKind::ProductTemplates,
            &row("key,name,programKey,chapterKey\nT1,Workbook,P1,C1"),
            &keys,
        )
        .unwrap();

        match record {
            EntityRecord::ProductTemplate(r) => {
                assert_eq!(r.program_id, program_id);
                assert_eq!(r.program_chapter_id, Some(junction_id));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_product_template_with_unlinked_chapter() {
        let mut keys = KeyMap::new();
        keys.register(EntityType::Program, "P1", Uuid::new_v4()).unwrap();

        let err = EntityRecord::from_row(
            DatasetKind::ProductTemplates,
            &row("key,name,programKey,chapterKey\nT1,Workbook,P1,C9"),
            &keys,
        )
        .unwrap_err();
        assert_eq!(
            err,
            RowFailure::UnresolvedReference {
                entity: EntityType::ProgramChapter,
                key: "P1:C9".into()
            }
        );
    }

    #[test]
    fn test_template_does_not_borrow_another_programs_junction() {
        let mut keys = KeyMap::new();
        let colon_program = Uuid::new_v4();
        let plain_program = Uuid::new_v4();
        let chapter_c = Uuid::new_v4();
        let colon_chapter = Uuid::new_v4();
        keys.register(EntityType::Program, "A:B", colon_program).unwrap();
        keys.register(EntityType::Program, "A", plain_program).unwrap();
        keys.register(EntityType::Chapter, "C", chapter_c).unwrap();
        keys.register(EntityType::Chapter, "B:C", colon_chapter).unwrap();
        keys.register(
            EntityType::ProgramChapter,
            junction_key(colon_program, chapter_c),
            Uuid::new_v4(),
        )
        .unwrap();

        let err = EntityRecord::from_row(
            DatasetKind::ProductTemplates,
            &row("key,name,programKey,chapterKey\nT1,Workbook,A,B:C"),
            &keys,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RowFailure::UnresolvedReference {
                entity: EntityType::ProgramChapter,
                ..
            }
        ));
    }

    #[test]
    fn test_pair_keys_stay_distinct() {
        let left = business_key_of(
            DatasetKind::ProgramChapters,
            &row("programKey,chapterKey\nA:B,C"),
        )
        .unwrap();
        let right = business_key_of(
            DatasetKind::ProgramChapters,
            &row("programKey,chapterKey\nA,B:C"),
        )
        .unwrap();

        assert_ne!(left, right);
        assert_eq!(left.to_string(), "A:B:C");
    }

    #[test]
    fn test_business_key_of() {
        assert_eq!(
            business_key_of(DatasetKind::Programs, &row("KEY,name\nP1,x")),
            Some(RowKey::Single("P1".to_string()))
        );
        assert_eq!(
            business_key_of(DatasetKind::ProgramChapters, &row("programKey,chapterKey\nP1,")),
            None
        );
    }
}
