use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erreur d'entrée/sortie: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erreur CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Erreur de sérialisation: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Erreur d'export XLSX: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Colonnes obligatoires manquantes: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Champ invalide ligne {line}, colonne {column}: {value:?}")]
    InvalidField {
        line: usize,
        column: String,
        value: String,
    },

    #[error("Identifiant d'équipement dupliqué: {0}")]
    DuplicateId(String),

    #[error("Fichier vide ou sans données")]
    EmptyFile,

    #[error("Modèle dégénéré: {0}")]
    DegenerateModel(String),

    #[error("Configuration invalide: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Custom(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Avertissement non fatal émis par une étape d'analyse.
/// Collecté dans le résultat final, jamais avalé silencieusement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationWarning {
    pub stage: String,
    pub message: String,
}

impl ComputationWarning {
    pub fn new(stage: &str, message: impl Into<String>) -> Self {
        ComputationWarning {
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}
