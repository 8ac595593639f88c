//! Téléchargement des données cadastrales depuis cadastre.data.gouv.fr
//!
//! Etalab publie par commune un jeu de fichiers GeoJSON compressés
//! (`cadastre-<insee>-<fichier>.json.gz`) sous
//! `.../geojson/communes/<département>/<insee>/`.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::{debug, info};

use crate::CadastreError;

/// URL de base des fichiers GeoJSON par commune d'Etalab
pub const CADASTRE_BASE_URL: &str =
    "https://cadastre.data.gouv.fr/data/etalab-cadastre/latest/geojson/communes";

/// Fichiers publiés pour chaque commune
pub const AVAILABLE_FILENAMES: &[&str] = &[
    "batiments",
    "communes",
    "feuilles",
    "lieux_dits",
    "parcelles",
    "prefixes_sections",
    "sections",
    "subdivisions_fiscales",
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Téléchargeur de données cadastrales par code INSEE
///
/// Les fichiers sont écrits sous `<output_dir>/<insee>/`.
pub struct Downloader {
    client: reqwest::Client,
    base_url: String,
    output_dir: PathBuf,
}

impl Downloader {
    /// Crée un téléchargeur avec le timeout par défaut (120 s)
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, CadastreError> {
        Self::with_timeout(output_dir, DEFAULT_TIMEOUT)
    }

    /// Crée un téléchargeur avec un timeout de requête borné
    pub fn with_timeout(
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, CadastreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: CADASTRE_BASE_URL.to_string(),
            output_dir: output_dir.into(),
        })
    }

    /// Remplace l'URL de base (miroir local, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// URL du répertoire des fichiers d'une commune.
    /// Le département est les 2 premiers caractères du code INSEE.
    fn commune_base_url(&self, insee: &str) -> String {
        format!("{}/{}/{}", self.base_url, &insee[..2], insee)
    }

    /// Nom d'archive d'un fichier, eg `cadastre-26065-parcelles.json.gz`
    fn archive_name(insee: &str, filename: &str) -> String {
        format!("cadastre-{}-{}.json.gz", insee, filename)
    }

    /// Télécharge une URL vers `dest` (répertoires parents créés au besoin)
    async fn download_file(&self, url: &str, dest: &Path) -> Result<(), CadastreError> {
        debug!(url, dest = %dest.display(), "Downloading");

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CadastreError::download(url, status.as_u16()));
        }

        let bytes = resp.bytes().await?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, &bytes)?;

        Ok(())
    }

    /// Télécharge les fichiers d'une commune et retourne leurs chemins.
    ///
    /// `filenames` vide = tous les fichiers publiés. Avec `decompress`, chaque
    /// archive est décompressée à côté d'elle et c'est le chemin décompressé
    /// qui est retourné.
    pub async fn download_by_insee(
        &self,
        insee: &str,
        filenames: &[&str],
        decompress: bool,
    ) -> Result<Vec<PathBuf>, CadastreError> {
        for name in filenames {
            if !AVAILABLE_FILENAMES.contains(name) {
                return Err(CadastreError::UnknownFilename(name.to_string()));
            }
        }

        let filenames = if filenames.is_empty() {
            AVAILABLE_FILENAMES
        } else {
            filenames
        };

        let base = self.commune_base_url(insee);
        let dir = self.output_dir.join(insee);

        let mut paths = Vec::with_capacity(filenames.len());
        for filename in filenames {
            let archive = Self::archive_name(insee, filename);
            let dest = dir.join(&archive);

            self.download_file(&format!("{}/{}", base, archive), &dest)
                .await?;

            paths.push(if decompress {
                gz_decompress(&dest)?
            } else {
                dest
            });
        }

        info!(insee, files = paths.len(), "Downloaded cadastre files");
        Ok(paths)
    }

    /// Télécharge et décompresse le fichier "parcelles" d'une commune.
    ///
    /// Le `SourceFile` retourné supprime l'archive et le fichier décompressé
    /// quand il est relâché, quel que soit le chemin de sortie.
    pub async fn fetch_parcelles(&self, insee: &str) -> Result<SourceFile, CadastreError> {
        let archive = Self::archive_name(insee, "parcelles");
        let gz_path = self.output_dir.join(insee).join(&archive);
        let url = format!("{}/{}", self.commune_base_url(insee), archive);

        self.download_file(&url, &gz_path).await?;

        let json_path = match gz_decompress(&gz_path) {
            Ok(path) => path,
            Err(e) => {
                // L'archive corrompue ne doit pas rester sur disque
                let _ = fs::remove_file(&gz_path);
                return Err(e);
            }
        };

        Ok(SourceFile::downloaded(gz_path, json_path))
    }
}

/// Décompresse un fichier `.json.gz` à côté de lui.
/// Retourne le chemin du fichier décompressé (extension `.gz` retirée).
pub fn gz_decompress(path: &Path) -> Result<PathBuf, CadastreError> {
    let file = fs::File::open(path)?;
    let mut decoder = GzDecoder::new(std::io::BufReader::new(file));

    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| CadastreError::decompression(path.display().to_string(), e.to_string()))?;

    let dest = path.with_extension("");
    fs::write(&dest, &raw)?;

    Ok(dest)
}

/// Fichier "parcelles" d'une commune : l'archive téléchargée et sa version
/// décompressée. Les deux artefacts sont supprimés au `drop`.
#[derive(Debug)]
pub struct SourceFile {
    json_path: PathBuf,
    artifacts: Vec<PathBuf>,
}

impl SourceFile {
    fn downloaded(gz_path: PathBuf, json_path: PathBuf) -> Self {
        Self {
            artifacts: vec![gz_path, json_path.clone()],
            json_path,
        }
    }

    /// Construit depuis un fichier local déjà décompressé (tests, miroir).
    /// Le fichier sera lui aussi supprimé au `drop`.
    pub fn local(json_path: impl Into<PathBuf>) -> Self {
        let json_path = json_path.into();
        Self {
            artifacts: vec![json_path.clone()],
            json_path,
        }
    }

    /// Chemin du fichier décompressé, prêt à lire
    pub fn path(&self) -> &Path {
        &self.json_path
    }
}

impl Drop for SourceFile {
    fn drop(&mut self) {
        for path in self.artifacts.drain(..) {
            let _ = fs::remove_file(&path);
        }
        // Le répertoire par commune, s'il est vide, part aussi
        if let Some(parent) = self.json_path.parent() {
            let _ = fs::remove_dir(parent);
        }
    }
}

/// Un code INSEE valide fait 5 chiffres
pub fn is_valid_insee(code: &str) -> bool {
    code.len() == 5 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Parse une liste de codes INSEE séparés par des virgules.
/// Les codes invalides sont écartés, les doublons dédupliqués, l'ordre conservé.
pub fn parse_insee_list(input: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for part in input.split(',') {
        let code = part.trim();
        if is_valid_insee(code) && !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }
    codes
}
