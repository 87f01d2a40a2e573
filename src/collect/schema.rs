//! Per-content-kind schema table.
//!
//! Every kind runs through the same pipeline; what differs is captured here:
//! which canonical fields exist and how they are typed, which wire keys feed
//! them, which dedup letters select which lookup column, and which merge
//! letters stage which field.

use crate::domain::ContentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Plain text, markup stripped.
    Text,
    /// Rich content, kept verbatim.
    Rich,
    /// Non-negative integer counter or flag.
    Int,
    /// Non-negative float.
    Float,
    /// Float rating in `0.0..=10.0`.
    Score,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// JSON keys and XML element names that carry this field.
    pub wire: &'static [&'static str],
}

const fn text(name: &'static str, wire: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Text,
        wire,
    }
}

const fn rich(name: &'static str, wire: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Rich,
        wire,
    }
}

const fn int(name: &'static str, wire: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Int,
        wire,
    }
}

const fn float(name: &'static str, wire: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Float,
        wire,
    }
}

const fn score(name: &'static str, wire: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Score,
        wire,
    }
}

/// Columns of the local store a dedup letter can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DedupColumn {
    Name,
    Category,
    Year,
    Region,
    Language,
    Cast,
    Director,
    Author,
    ExternalId,
}

impl DedupColumn {
    /// Canonical field the column is filled from.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Category => "category_id",
            Self::Year => "year",
            Self::Region => "region",
            Self::Language => "language",
            Self::Cast => "actor",
            Self::Director => "director",
            Self::Author => "author",
            Self::ExternalId => "external_id",
        }
    }

    /// Cast lists differ in order and completeness across sources, so cast is
    /// compared with a contains test; everything else is exact.
    #[must_use]
    pub const fn is_fuzzy(self) -> bool {
        matches!(self, Self::Cast)
    }
}

/// What a merge letter stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeTarget {
    Field(&'static str),
    /// A progress counter that must never move backwards.
    Serial(&'static str),
    PlayGroups,
    DownGroups,
}

/// Wire keys for one multi-group block (play or download).
#[derive(Debug, Clone, Copy)]
pub struct GroupKeys {
    pub from: &'static str,
    pub url: &'static str,
    pub server: &'static str,
    pub note: &'static str,
}

#[derive(Debug)]
pub struct KindSchema {
    pub kind: ContentKind,
    /// Element name of one record inside the XML `<list>`.
    pub xml_element: &'static str,
    /// `ac` value requesting a detailed record listing.
    pub list_action: &'static str,
    pub id_wire: &'static [&'static str],
    pub category_wire: &'static [&'static str],
    pub fields: &'static [FieldSpec],
    pub play: Option<GroupKeys>,
    pub down: Option<GroupKeys>,
    pub dedup_letters: &'static [(char, DedupColumn)],
    pub merge_letters: &'static [(char, MergeTarget)],
}

impl KindSchema {
    /// Resolves a wire key (JSON key or XML element name) to its field.
    #[must_use]
    pub fn field_for_wire(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.wire.contains(&key))
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn dedup_column(&self, letter: char) -> Option<DedupColumn> {
        self.dedup_letters
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, c)| *c)
    }

    #[must_use]
    pub fn merge_target(&self, letter: char) -> Option<MergeTarget> {
        self.merge_letters
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, t)| *t)
    }

    #[must_use]
    pub const fn has_groups(&self) -> bool {
        self.play.is_some() || self.down.is_some()
    }
}

#[must_use]
pub fn schema(kind: ContentKind) -> &'static KindSchema {
    match kind {
        ContentKind::Video => &VIDEO,
        ContentKind::Article => &ARTICLE,
        ContentKind::Actor => &ACTOR,
        ContentKind::Role => &ROLE,
        ContentKind::Website => &WEBSITE,
        ContentKind::Manga => &MANGA,
    }
}

static VIDEO: KindSchema = KindSchema {
    kind: ContentKind::Video,
    xml_element: "video",
    list_action: "videolist",
    id_wire: &["vod_id", "id"],
    category_wire: &["type_id", "tid"],
    fields: &[
        text("name", &["vod_name", "name"]),
        text("sub", &["vod_sub", "sub"]),
        text("slug", &["vod_en", "en"]),
        text("letter", &["vod_letter", "letter"]),
        text("tag", &["vod_tag", "tag"]),
        text("class", &["vod_class", "type"]),
        text("pic", &["vod_pic", "pic"]),
        text("actor", &["vod_actor", "actor"]),
        text("director", &["vod_director", "director"]),
        text("writer", &["vod_writer", "writer"]),
        text("blurb", &["vod_blurb", "blurb"]),
        text("remarks", &["vod_remarks", "note"]),
        text("pubdate", &["vod_pubdate", "pubdate"]),
        int("total", &["vod_total", "total"]),
        text("serial", &["vod_serial", "serial"]),
        text("tv", &["vod_tv", "tv"]),
        text("weekday", &["vod_weekday", "weekday"]),
        text("region", &["vod_area", "area"]),
        text("language", &["vod_lang", "lang"]),
        text("year", &["vod_year", "year"]),
        text("version", &["vod_version", "version"]),
        text("state", &["vod_state", "state"]),
        rich("content", &["vod_content", "des"]),
        score("score", &["vod_score", "score"]),
        int("score_num", &["vod_score_num"]),
        int("duration", &["vod_duration", "duration"]),
        int("hits", &["vod_hits", "hits"]),
        int("isend", &["vod_isend", "isend"]),
        text("external_id", &["vod_douban_id", "douban_id"]),
        text("updated", &["vod_time", "last"]),
    ],
    play: Some(GroupKeys {
        from: "vod_play_from",
        url: "vod_play_url",
        server: "vod_play_server",
        note: "vod_play_note",
    }),
    down: Some(GroupKeys {
        from: "vod_down_from",
        url: "vod_down_url",
        server: "vod_down_server",
        note: "vod_down_note",
    }),
    dedup_letters: &[
        ('a', DedupColumn::Name),
        ('b', DedupColumn::Category),
        ('c', DedupColumn::Year),
        ('d', DedupColumn::Region),
        ('e', DedupColumn::Language),
        ('f', DedupColumn::Cast),
        ('g', DedupColumn::Director),
        ('h', DedupColumn::ExternalId),
    ],
    merge_letters: &[
        ('a', MergeTarget::PlayGroups),
        ('b', MergeTarget::DownGroups),
        ('c', MergeTarget::Serial("serial")),
        ('d', MergeTarget::Field("remarks")),
        ('e', MergeTarget::Field("director")),
        ('f', MergeTarget::Field("actor")),
        ('g', MergeTarget::Field("year")),
        ('h', MergeTarget::Field("region")),
        ('i', MergeTarget::Field("language")),
        ('j', MergeTarget::Field("pic")),
        ('k', MergeTarget::Field("content")),
        ('l', MergeTarget::Field("tag")),
        ('m', MergeTarget::Field("sub")),
        ('n', MergeTarget::Field("class")),
        ('o', MergeTarget::Field("writer")),
        ('p', MergeTarget::Field("version")),
        ('q', MergeTarget::Field("state")),
        ('r', MergeTarget::Field("blurb")),
        ('s', MergeTarget::Field("tv")),
        ('t', MergeTarget::Field("weekday")),
        ('u', MergeTarget::Field("total")),
        ('v', MergeTarget::Field("isend")),
        ('w', MergeTarget::Field("score")),
        ('x', MergeTarget::Field("duration")),
        ('y', MergeTarget::Field("pubdate")),
        ('z', MergeTarget::Field("external_id")),
    ],
};

static ARTICLE: KindSchema = KindSchema {
    kind: ContentKind::Article,
    xml_element: "art",
    list_action: "detail",
    id_wire: &["art_id", "id"],
    category_wire: &["type_id", "tid"],
    fields: &[
        text("name", &["art_name", "name"]),
        text("sub", &["art_sub", "sub"]),
        text("slug", &["art_en", "en"]),
        text("letter", &["art_letter", "letter"]),
        text("tag", &["art_tag", "tag"]),
        text("class", &["art_class", "type"]),
        text("pic", &["art_pic", "pic"]),
        text("author", &["art_author", "author"]),
        text("source", &["art_from", "from"]),
        text("blurb", &["art_blurb", "blurb"]),
        text("remarks", &["art_remarks", "note"]),
        text("jumpurl", &["art_jumpurl", "jumpurl"]),
        rich("content", &["art_content", "des"]),
        int("level", &["art_level", "level"]),
        int("hits", &["art_hits", "hits"]),
        score("score", &["art_score", "score"]),
        text("updated", &["art_time", "last"]),
    ],
    play: None,
    down: None,
    dedup_letters: &[
        ('a', DedupColumn::Name),
        ('b', DedupColumn::Category),
        ('c', DedupColumn::Author),
    ],
    merge_letters: &[
        ('a', MergeTarget::Field("content")),
        ('b', MergeTarget::Field("author")),
        ('c', MergeTarget::Field("source")),
        ('d', MergeTarget::Field("pic")),
        ('e', MergeTarget::Field("blurb")),
        ('f', MergeTarget::Field("remarks")),
        ('g', MergeTarget::Field("tag")),
        ('h', MergeTarget::Field("sub")),
        ('i', MergeTarget::Field("class")),
        ('j', MergeTarget::Field("jumpurl")),
        ('k', MergeTarget::Field("level")),
    ],
};

static ACTOR: KindSchema = KindSchema {
    kind: ContentKind::Actor,
    xml_element: "actor",
    list_action: "detail",
    id_wire: &["actor_id", "id"],
    category_wire: &["type_id", "tid"],
    fields: &[
        text("name", &["actor_name", "name"]),
        text("slug", &["actor_en", "en"]),
        text("letter", &["actor_letter", "letter"]),
        text("alias", &["actor_alias", "alias"]),
        text("sex", &["actor_sex", "sex"]),
        text("region", &["actor_area", "area"]),
        int("height", &["actor_height", "height"]),
        int("weight", &["actor_weight", "weight"]),
        text("birthday", &["actor_birthday", "birthday"]),
        text("birtharea", &["actor_birtharea", "birtharea"]),
        text("blood", &["actor_blood", "blood"]),
        text("starsign", &["actor_starsign", "starsign"]),
        text("school", &["actor_school", "school"]),
        text("works", &["actor_works", "works"]),
        text("tag", &["actor_tag", "tag"]),
        text("class", &["actor_class", "type"]),
        text("pic", &["actor_pic", "pic"]),
        text("blurb", &["actor_blurb", "blurb"]),
        text("remarks", &["actor_remarks", "note"]),
        rich("content", &["actor_content", "des"]),
        int("level", &["actor_level", "level"]),
        int("hits", &["actor_hits", "hits"]),
        score("score", &["actor_score", "score"]),
    ],
    play: None,
    down: None,
    dedup_letters: &[
        ('a', DedupColumn::Name),
        ('b', DedupColumn::Category),
        ('c', DedupColumn::Region),
    ],
    merge_letters: &[
        ('a', MergeTarget::Field("alias")),
        ('b', MergeTarget::Field("sex")),
        ('c', MergeTarget::Field("region")),
        ('d', MergeTarget::Field("height")),
        ('e', MergeTarget::Field("weight")),
        ('f', MergeTarget::Field("birthday")),
        ('g', MergeTarget::Field("birtharea")),
        ('h', MergeTarget::Field("blood")),
        ('i', MergeTarget::Field("starsign")),
        ('j', MergeTarget::Field("school")),
        ('k', MergeTarget::Field("works")),
        ('l', MergeTarget::Field("tag")),
        ('m', MergeTarget::Field("class")),
        ('n', MergeTarget::Field("pic")),
        ('o', MergeTarget::Field("blurb")),
        ('p', MergeTarget::Field("remarks")),
        ('q', MergeTarget::Field("content")),
    ],
};

static ROLE: KindSchema = KindSchema {
    kind: ContentKind::Role,
    xml_element: "role",
    list_action: "detail",
    id_wire: &["role_id", "id"],
    category_wire: &["type_id", "tid"],
    fields: &[
        text("name", &["role_name", "name"]),
        text("slug", &["role_en", "en"]),
        text("letter", &["role_letter", "letter"]),
        text("actor", &["role_actor", "actor"]),
        text("external_id", &["role_rid", "rid"]),
        text("pic", &["role_pic", "pic"]),
        int("sort", &["role_sort", "sort"]),
        text("blurb", &["role_blurb", "blurb"]),
        text("remarks", &["role_remarks", "note"]),
        rich("content", &["role_content", "des"]),
        int("level", &["role_level", "level"]),
        int("hits", &["role_hits", "hits"]),
        score("score", &["role_score", "score"]),
    ],
    play: None,
    down: None,
    dedup_letters: &[
        ('a', DedupColumn::Name),
        ('b', DedupColumn::Cast),
        ('c', DedupColumn::ExternalId),
    ],
    merge_letters: &[
        ('a', MergeTarget::Field("actor")),
        ('b', MergeTarget::Field("pic")),
        ('c', MergeTarget::Field("sort")),
        ('d', MergeTarget::Field("remarks")),
        ('e', MergeTarget::Field("content")),
        ('f', MergeTarget::Field("blurb")),
    ],
};

static WEBSITE: KindSchema = KindSchema {
    kind: ContentKind::Website,
    xml_element: "website",
    list_action: "detail",
    id_wire: &["website_id", "id"],
    category_wire: &["type_id", "tid"],
    fields: &[
        text("name", &["website_name", "name"]),
        text("sub", &["website_sub", "sub"]),
        text("slug", &["website_en", "en"]),
        text("letter", &["website_letter", "letter"]),
        text("jumpurl", &["website_jumpurl", "jumpurl"]),
        text("pic", &["website_pic", "pic"]),
        text("logo", &["website_logo", "logo"]),
        text("region", &["website_area", "area"]),
        text("language", &["website_lang", "lang"]),
        text("tag", &["website_tag", "tag"]),
        text("class", &["website_class", "type"]),
        text("blurb", &["website_blurb", "blurb"]),
        text("remarks", &["website_remarks", "note"]),
        rich("content", &["website_content", "des"]),
        int("level", &["website_level", "level"]),
        int("hits", &["website_hits", "hits"]),
        score("score", &["website_score", "score"]),
    ],
    play: None,
    down: None,
    dedup_letters: &[('a', DedupColumn::Name), ('b', DedupColumn::Category)],
    merge_letters: &[
        ('a', MergeTarget::Field("jumpurl")),
        ('b', MergeTarget::Field("pic")),
        ('c', MergeTarget::Field("logo")),
        ('d', MergeTarget::Field("region")),
        ('e', MergeTarget::Field("language")),
        ('f', MergeTarget::Field("tag")),
        ('g', MergeTarget::Field("class")),
        ('h', MergeTarget::Field("blurb")),
        ('i', MergeTarget::Field("remarks")),
        ('j', MergeTarget::Field("content")),
        ('k', MergeTarget::Field("level")),
    ],
};

static MANGA: KindSchema = KindSchema {
    kind: ContentKind::Manga,
    xml_element: "manga",
    list_action: "detail",
    id_wire: &["manga_id", "id"],
    category_wire: &["type_id", "tid"],
    fields: &[
        text("name", &["manga_name", "name"]),
        text("sub", &["manga_sub", "sub"]),
        text("slug", &["manga_en", "en"]),
        text("letter", &["manga_letter", "letter"]),
        text("tag", &["manga_tag", "tag"]),
        text("class", &["manga_class", "type"]),
        text("pic", &["manga_pic", "pic"]),
        text("author", &["manga_author", "author"]),
        text("blurb", &["manga_blurb", "blurb"]),
        text("remarks", &["manga_remarks", "note"]),
        int("total", &["manga_total", "total"]),
        text("serial", &["manga_serial", "serial"]),
        text("region", &["manga_area", "area"]),
        text("language", &["manga_lang", "lang"]),
        text("year", &["manga_year", "year"]),
        text("state", &["manga_state", "state"]),
        rich("content", &["manga_content", "des"]),
        score("score", &["manga_score", "score"]),
        int("hits", &["manga_hits", "hits"]),
        int("isend", &["manga_isend", "isend"]),
        text("external_id", &["manga_douban_id", "douban_id"]),
        text("updated", &["manga_time", "last"]),
    ],
    play: Some(GroupKeys {
        from: "manga_play_from",
        url: "manga_play_url",
        server: "manga_play_server",
        note: "manga_play_note",
    }),
    down: None,
    dedup_letters: &[
        ('a', DedupColumn::Name),
        ('b', DedupColumn::Category),
        ('c', DedupColumn::Year),
        ('d', DedupColumn::Region),
        ('e', DedupColumn::Language),
        ('f', DedupColumn::Author),
        ('g', DedupColumn::ExternalId),
    ],
    merge_letters: &[
        ('a', MergeTarget::PlayGroups),
        ('b', MergeTarget::Serial("serial")),
        ('c', MergeTarget::Field("remarks")),
        ('d', MergeTarget::Field("author")),
        ('e', MergeTarget::Field("year")),
        ('f', MergeTarget::Field("region")),
        ('g', MergeTarget::Field("language")),
        ('h', MergeTarget::Field("pic")),
        ('i', MergeTarget::Field("content")),
        ('j', MergeTarget::Field("tag")),
        ('k', MergeTarget::Field("sub")),
        ('l', MergeTarget::Field("class")),
        ('m', MergeTarget::Field("blurb")),
        ('n', MergeTarget::Field("total")),
        ('o', MergeTarget::Field("isend")),
        ('p', MergeTarget::Field("state")),
    ],
};
