//! Index layouts and the index definitions provisioned for them.

use serde::Serialize;

/// Field layout of the target index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexLayout {
    /// `id`, `content`, `metadata`, `content_vector`.
    #[default]
    Standard,
    /// `id`, `docTitle`, `description`, `descriptionVector`.
    Titled,
}

impl IndexLayout {
    /// Name of the vector field queried during similarity search.
    pub fn vector_field(self) -> &'static str {
        match self {
            Self::Standard => "content_vector",
            Self::Titled => "descriptionVector",
        }
    }

    /// Name of the field holding chunk text.
    pub fn content_field(self) -> &'static str {
        match self {
            Self::Standard => "content",
            Self::Titled => "description",
        }
    }
}

impl std::str::FromStr for IndexLayout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "titled" => Ok(Self::Titled),
            _ => Err(()),
        }
    }
}

/// Body of a `PUT indexes/{name}` request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Field list.
    pub fields: Vec<FieldDefinition>,
    /// Vector search algorithms and profiles.
    pub vector_search: VectorSearch,
}

/// One index field.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Field name.
    pub name: String,
    /// EDM type, e.g. `Edm.String`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Whether the field is the document key.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub key: bool,
    /// Whether the field participates in search.
    pub searchable: bool,
    /// Vector length for vector fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Vector profile for vector fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

/// Vector search configuration block.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VectorSearch {
    /// Algorithm configurations.
    pub algorithms: Vec<AlgorithmConfiguration>,
    /// Profiles binding vector fields to algorithms.
    pub profiles: Vec<VectorProfile>,
}

/// Named algorithm configuration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlgorithmConfiguration {
    /// Configuration name.
    pub name: String,
    /// Algorithm kind, always `hnsw` here.
    pub kind: String,
}

/// Named vector profile.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VectorProfile {
    /// Profile name.
    pub name: String,
    /// Algorithm configuration used by the profile.
    pub algorithm: String,
}

fn string_field(name: &str, key: bool, searchable: bool) -> FieldDefinition {
    FieldDefinition {
        name: name.to_string(),
        field_type: "Edm.String".to_string(),
        key,
        searchable,
        dimensions: None,
        vector_search_profile: None,
    }
}

/// Build the definition for a new index called `name`.
pub fn index_definition(name: &str, layout: IndexLayout, dimension: usize) -> IndexDefinition {
    let profile = format!("{name}-vector-config");
    let algorithm = format!("{name}-algorithms-config");

    let mut fields = vec![string_field("id", true, false)];
    match layout {
        IndexLayout::Standard => {
            fields.push(string_field("content", false, true));
            fields.push(string_field("metadata", false, true));
        }
        IndexLayout::Titled => {
            fields.push(string_field("docTitle", false, true));
            fields.push(string_field("description", false, true));
        }
    }
    fields.push(FieldDefinition {
        name: layout.vector_field().to_string(),
        field_type: "Collection(Edm.Single)".to_string(),
        key: false,
        searchable: true,
        dimensions: Some(dimension),
        vector_search_profile: Some(profile.clone()),
    });

    IndexDefinition {
        name: name.to_string(),
        fields,
        vector_search: VectorSearch {
            algorithms: vec![AlgorithmConfiguration {
                name: algorithm.clone(),
                kind: "hnsw".to_string(),
            }],
            profiles: vec![VectorProfile {
                name: profile,
                algorithm,
            }],
        },
    }
}
