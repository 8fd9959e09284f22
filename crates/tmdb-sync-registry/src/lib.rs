//! The declarative per-kind table: what each of the ten synced entity
//! kinds is called upstream, what table it lands in, how it's keyed,
//! and what it depends on. Driver and loader code is written once and
//! parameterized by this data rather than duplicated per kind.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Language,
    Country,
    Genre,
    Keyword,
    Collection,
    Company,
    Network,
    Person,
    Movie,
    TvSeries,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Language => "language",
            Kind::Country => "country",
            Kind::Genre => "genre",
            Kind::Keyword => "keyword",
            Kind::Collection => "collection",
            Kind::Company => "company",
            Kind::Network => "network",
            Kind::Person => "person",
            Kind::Movie => "movie",
            Kind::TvSeries => "tv_series",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KindConfig {
    pub kind: Kind,
    /// Root table the entity's primary row lives in.
    pub table: &'static str,
    /// Column the entity's upstream numeric/string id maps to.
    pub id_column: &'static str,
    /// Has a dedicated changes/export endpoint under this name upstream
    /// (`movie`, `tv`, `person` — reference kinds have none and are
    /// instead refreshed wholesale every run).
    pub export_type: Option<&'static str>,
    pub changes_type: Option<&'static str>,
    /// How many ids are fetched/mapped/loaded per chunk.
    pub chunk_size: usize,
    /// Whether this kind carries a `popularity` column refreshed from
    /// the per-id detail payload after the bulk load commits.
    pub has_popularity: bool,
    /// Other kinds this one has a foreign key into; determines both
    /// sync order and which reference sets must be loaded before
    /// mapping this kind's rows.
    pub depends_on: &'static [Kind],
}

pub const ALL_KINDS: &[KindConfig] = &[
    KindConfig {
        kind: Kind::Language,
        table: "tmdb_language",
        id_column: "iso_639_1",
        export_type: None,
        changes_type: None,
        chunk_size: 1000,
        has_popularity: false,
        depends_on: &[],
    },
    KindConfig {
        kind: Kind::Country,
        table: "tmdb_country",
        id_column: "iso_3166_1",
        export_type: None,
        changes_type: None,
        chunk_size: 1000,
        has_popularity: false,
        depends_on: &[],
    },
    KindConfig {
        kind: Kind::Genre,
        table: "tmdb_genre",
        id_column: "id",
        export_type: None,
        changes_type: None,
        chunk_size: 1000,
        has_popularity: false,
        depends_on: &[],
    },
    KindConfig {
        kind: Kind::Keyword,
        table: "tmdb_keyword",
        id_column: "id",
        export_type: Some("keyword"),
        changes_type: None,
        chunk_size: 5000,
        has_popularity: false,
        depends_on: &[],
    },
    KindConfig {
        kind: Kind::Collection,
        table: "tmdb_collection",
        id_column: "id",
        export_type: Some("collection"),
        changes_type: None,
        chunk_size: 200,
        has_popularity: false,
        depends_on: &[],
    },
    KindConfig {
        kind: Kind::Company,
        table: "tmdb_company",
        id_column: "id",
        export_type: Some("production_company"),
        changes_type: None,
        chunk_size: 500,
        has_popularity: false,
        depends_on: &[Kind::Country],
    },
    KindConfig {
        kind: Kind::Network,
        table: "tmdb_network",
        id_column: "id",
        export_type: Some("tv_network"),
        changes_type: None,
        chunk_size: 500,
        has_popularity: false,
        depends_on: &[Kind::Country],
    },
    KindConfig {
        kind: Kind::Person,
        table: "tmdb_person",
        id_column: "id",
        export_type: Some("person"),
        changes_type: Some("person"),
        chunk_size: 200,
        has_popularity: true,
        depends_on: &[],
    },
    KindConfig {
        kind: Kind::Movie,
        table: "tmdb_movie",
        id_column: "id",
        export_type: Some("movie"),
        changes_type: Some("movie"),
        chunk_size: 100,
        has_popularity: true,
        depends_on: &[
            Kind::Language,
            Kind::Country,
            Kind::Genre,
            Kind::Keyword,
            Kind::Collection,
            Kind::Company,
            Kind::Person,
        ],
    },
    KindConfig {
        kind: Kind::TvSeries,
        table: "tmdb_serie",
        id_column: "id",
        export_type: Some("tv_series"),
        changes_type: Some("tv"),
        chunk_size: 100,
        has_popularity: true,
        depends_on: &[
            Kind::Language,
            Kind::Country,
            Kind::Genre,
            Kind::Keyword,
            Kind::Network,
            Kind::Company,
            Kind::Person,
        ],
    },
];

pub fn config_for(kind: Kind) -> &'static KindConfig {
    ALL_KINDS
        .iter()
        .find(|entry| entry.kind == kind)
        .expect("every Kind variant has a KindConfig entry")
}

/// Returns all kinds in an order where every kind appears after
/// everything it depends on, so a top-to-bottom run never hits a
/// missing foreign key.
pub fn sync_order() -> Vec<Kind> {
    let mut ordered = Vec::with_capacity(ALL_KINDS.len());
    let mut placed = std::collections::HashSet::new();

    fn visit(
        kind: Kind,
        ordered: &mut Vec<Kind>,
        placed: &mut std::collections::HashSet<Kind>,
    ) {
        if placed.contains(&kind) {
            return;
        }
        let config = config_for(kind);
        for &dep in config.depends_on {
            visit(dep, ordered, placed);
        }
        placed.insert(kind);
        ordered.push(kind);
    }

    for entry in ALL_KINDS {
        visit(entry.kind, &mut ordered, &mut placed);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_order_respects_dependencies() {
        let order = sync_order();
        let position = |kind: Kind| order.iter().position(|&k| k == kind).unwrap();
        assert!(position(Kind::Genre) < position(Kind::Movie));
        assert!(position(Kind::Person) < position(Kind::Movie));
        assert!(position(Kind::Network) < position(Kind::TvSeries));
    }

    #[test]
    fn every_kind_has_a_config() {
        for kind in [
            Kind::Language,
            Kind::Country,
            Kind::Genre,
            Kind::Keyword,
            Kind::Collection,
            Kind::Company,
            Kind::Network,
            Kind::Person,
            Kind::Movie,
            Kind::TvSeries,
        ] {
            assert_eq!(config_for(kind).kind, kind);
        }
    }
}
