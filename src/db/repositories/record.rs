use crate::collect::dedup::{DedupKey, DedupTerm, MatchOp};
use crate::collect::episodes::{EncodedGroups, decode_groups, encode_groups};
use crate::collect::record::{CanonicalRecord, FieldPatch, FieldValue, StoredRecord};
use crate::collect::schema::DedupColumn;
use crate::collect::store::InsertOutcome;
use crate::domain::ContentKind;
use crate::entities::{catalog_records, prelude::*};
use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::sea_query::{Condition, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use std::collections::BTreeMap;

/// Canonical fields mirrored into their own columns for dedup lookups.
const FLAT_FIELDS: &[&str] = &[
    "name",
    "year",
    "region",
    "language",
    "actor",
    "director",
    "author",
    "external_id",
];

pub struct RecordRepository {
    conn: DatabaseConnection,
}

impl RecordRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_stored_model(m: catalog_records::Model) -> Result<StoredRecord> {
        let kind: ContentKind = m.kind.parse().map_err(anyhow::Error::msg)?;
        let fields: BTreeMap<String, FieldValue> = serde_json::from_str(&m.fields_json)
            .with_context(|| format!("Corrupt fields_json on record {}", m.id))?;

        let play = decode_groups(&EncodedGroups {
            from: m.play_from,
            server: m.play_server,
            note: m.play_note,
            url: m.play_url,
        });
        let down = decode_groups(&EncodedGroups {
            from: m.down_from,
            server: m.down_server,
            note: m.down_note,
            url: m.down_url,
        });

        Ok(StoredRecord {
            id: m.id,
            kind,
            category_id: m.category_id,
            locked: m.locked,
            fields,
            play,
            down,
        })
    }

    fn column_for(column: DedupColumn) -> catalog_records::Column {
        match column {
            DedupColumn::Name => catalog_records::Column::Name,
            DedupColumn::Category => catalog_records::Column::CategoryId,
            DedupColumn::Year => catalog_records::Column::Year,
            DedupColumn::Region => catalog_records::Column::Region,
            DedupColumn::Language => catalog_records::Column::Language,
            DedupColumn::Cast => catalog_records::Column::Actor,
            DedupColumn::Director => catalog_records::Column::Director,
            DedupColumn::Author => catalog_records::Column::Author,
            DedupColumn::ExternalId => catalog_records::Column::ExternalId,
        }
    }

    fn term_expr(term: &DedupTerm) -> SimpleExpr {
        let col = Self::column_for(term.column);
        if term.column == DedupColumn::Category {
            return col.eq(term.value.parse::<i32>().unwrap_or(0));
        }
        match term.op {
            MatchOp::Equals => col.eq(term.value.as_str()),
            MatchOp::Contains => col.contains(term.value.as_str()),
        }
    }

    fn key_condition(key: &DedupKey) -> Condition {
        let mut cond =
            Condition::all().add(catalog_records::Column::Kind.eq(key.kind.as_str()));
        for term in &key.terms {
            cond = cond.add(Self::term_expr(term));
        }
        if !key.any_of.is_empty() {
            let any = key
                .any_of
                .iter()
                .fold(Condition::any(), |any, term| any.add(Self::term_expr(term)));
            cond = cond.add(any);
        }
        cond
    }

    pub async fn find_match(&self, key: &DedupKey) -> Result<Option<StoredRecord>> {
        let row = CatalogRecords::find()
            .filter(Self::key_condition(key))
            .order_by_asc(catalog_records::Column::Id)
            .one(&self.conn)
            .await?;

        row.map(Self::map_stored_model).transpose()
    }

    /// Looks a row up by the fingerprint it was inserted under. Updates can
    /// move the flat columns away from that fingerprint.
    pub async fn find_by_dedup_key(
        &self,
        kind: ContentKind,
        fingerprint: &str,
    ) -> Result<Option<StoredRecord>> {
        let row = CatalogRecords::find()
            .filter(catalog_records::Column::Kind.eq(kind.as_str()))
            .filter(catalog_records::Column::DedupKey.eq(fingerprint))
            .one(&self.conn)
            .await?;

        row.map(Self::map_stored_model).transpose()
    }

    pub async fn get(&self, id: i32) -> Result<Option<StoredRecord>> {
        let row = CatalogRecords::find_by_id(id).one(&self.conn).await?;
        row.map(Self::map_stored_model).transpose()
    }

    pub async fn insert(&self, record: &CanonicalRecord, fingerprint: &str) -> Result<InsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let play = encode_groups(&record.play);
        let down = encode_groups(&record.down);

        let active = catalog_records::ActiveModel {
            kind: Set(record.kind.to_string()),
            dedup_key: Set(fingerprint.to_string()),
            remote_id: Set(record.remote_id.clone()),
            name: Set(record.text("name")),
            category_id: Set(record.category_id),
            parent_category_id: Set(record.parent_category_id),
            year: Set(record.text("year")),
            region: Set(record.text("region")),
            language: Set(record.text("language")),
            actor: Set(record.text("actor")),
            director: Set(record.text("director")),
            author: Set(record.text("author")),
            external_id: Set(record.text("external_id")),
            locked: Set(false),
            fields_json: Set(serde_json::to_string(&record.fields)?),
            play_from: Set(play.from),
            play_server: Set(play.server),
            play_note: Set(play.note),
            play_url: Set(play.url),
            down_from: Set(down.from),
            down_server: Set(down.server),
            down_note: Set(down.note),
            down_url: Set(down.url),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match CatalogRecords::insert(active).exec(&self.conn).await {
            Ok(res) => Ok(InsertOutcome::Inserted(res.last_insert_id)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies a patch. Staged fields are merged into the stored field map
    /// and mirrored into their flat columns.
    pub async fn update(&self, id: i32, patch: &FieldPatch) -> Result<()> {
        let row = CatalogRecords::find_by_id(id)
            .one(&self.conn)
            .await?
            .with_context(|| format!("Record {id} disappeared before update"))?;

        let mut fields: BTreeMap<String, FieldValue> = serde_json::from_str(&row.fields_json)
            .with_context(|| format!("Corrupt fields_json on record {id}"))?;
        for (name, value) in &patch.fields {
            fields.insert(name.clone(), value.clone());
        }

        let mut active: catalog_records::ActiveModel = row.into();
        for name in FLAT_FIELDS {
            let Some(value) = patch.fields.get(*name) else {
                continue;
            };
            let text = value.as_text();
            match *name {
                "name" => active.name = Set(text),
                "year" => active.year = Set(text),
                "region" => active.region = Set(text),
                "language" => active.language = Set(text),
                "actor" => active.actor = Set(text),
                "director" => active.director = Set(text),
                "author" => active.author = Set(text),
                _ => active.external_id = Set(text),
            }
        }

        active.fields_json = Set(serde_json::to_string(&fields)?);
        if let Some(play) = &patch.play {
            let encoded = encode_groups(play);
            active.play_from = Set(encoded.from);
            active.play_server = Set(encoded.server);
            active.play_note = Set(encoded.note);
            active.play_url = Set(encoded.url);
        }
        if let Some(down) = &patch.down {
            let encoded = encode_groups(down);
            active.down_from = Set(encoded.from);
            active.down_server = Set(encoded.server);
            active.down_note = Set(encoded.note);
            active.down_url = Set(encoded.url);
        }
        active.updated_at = Set(patch.updated_at.to_rfc3339());

        active.update(&self.conn).await?;
        Ok(())
    }

    /// Locked records are never updated by a run.
    pub async fn set_locked(&self, id: i32, locked: bool) -> Result<bool> {
        let result = CatalogRecords::update_many()
            .col_expr(
                catalog_records::Column::Locked,
                sea_orm::sea_query::Expr::value(locked),
            )
            .filter(catalog_records::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count(&self, kind: ContentKind) -> Result<u64> {
        let count = CatalogRecords::find()
            .filter(catalog_records::Column::Kind.eq(kind.as_str()))
            .count(&self.conn)
            .await?;

        Ok(count)
    }
}
