/// Loading of the `pipeline.yml` configuration.
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {}
}

pub use self::errors::*;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "pipeline.yml";

/// The built-in configuration; files given by the user are overlaid on top of it.
pub const DEFAULT_CONFIG: &str = r#"# mrnaseq pipeline configuration
#
# Input reads are expected in `input_dir` as <prefix>.fastq.gz (single-end) or
# <prefix>.fastq.1.gz/<prefix>.fastq.2.gz (paired-end).  The prefix is split on
# underscores into condition_replicate, condition_treatment_replicate or
# group_condition_treatment_replicate.

input_dir: data.dir

# Directory for temporary files created by the statements.
tmp_dir: /tmp

# Library strandedness: RF/R (reverse), FR/F (forward) or none.
strandedness: none

database:
  url: sqlite:///./csvdb

annotations:
  dir: ''
  # SQLite database with transcript_id -> gene_id mapping.
  database: ''
  ensembl_geneset: geneset_all.gtf.gz
  dbtable: transcript_info

genome:
  dir: ''
  name: hg38

star:
  index_dir: ''
  threads: 12

# Were the reads mapped using the CGAT mapping pipeline?  If so, sequence
# qualities are re-added with `cgat bam2bam` in the given conda environment.
cgat_mapping:
  enabled: false
  venv:

picard:
  ref_flat: ''
  memory: 12G
  threads: 3

salmon:
  index: ''
  libtype: A
  # Environment module version to switch to, if any.
  version:
  threads: 8

deeptools:
  norm_method: BPM
  memory: 2G
  threads: 10

sql:
  himem: 10G

report:
  # Jupyter notebook templates rendered to html by the `report` task.
  path: []
"#;

/// Library strandedness as configured, matched without regard to case.
#[derive(Clone, Copy, Debug, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Strandedness {
    /// First read maps to the reverse strand of the transcript.
    #[strum(serialize = "RF", serialize = "R")]
    Reverse,
    /// First read maps to the forward strand of the transcript.
    #[strum(serialize = "FR", serialize = "F")]
    Forward,
    #[strum(
        serialize = "none",
        serialize = "",
        serialize = "0",
        serialize = "false"
    )]
    Unstranded,
}

impl Strandedness {
    /// Whether the library is stranded at all.
    pub fn is_stranded(&self) -> bool {
        *self != Strandedness::Unstranded
    }

    /// Value for `featureCounts -s`.
    pub fn feature_counts_strand(&self) -> &'static str {
        match self {
            Strandedness::Reverse => "2",
            Strandedness::Forward => "1",
            Strandedness::Unstranded => "0",
        }
    }

    /// Value for Picard's `STRAND` option.
    pub fn picard_strand(&self) -> &'static str {
        match self {
            Strandedness::Reverse => "SECOND_READ_TRANSCRIPTION_STRAND",
            Strandedness::Forward => "FIRST_READ_TRANSCRIPTION_STRAND",
            Strandedness::Unstranded => "NONE",
        }
    }
}

/// Accept strings as well as YAML `0`, `false` and `null` for the strandedness.
fn deserialize_strandedness<'de, D>(deserializer: D) -> ::std::result::Result<Strandedness, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        _ => return Err(serde::de::Error::custom("strandedness must be a scalar")),
    };
    Strandedness::from_str(text.trim())
        .map_err(|_| serde::de::Error::custom(format!("unknown strandedness {:?}", text)))
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseParams {
    /// SQLAlchemy-style URL, e.g., `sqlite:///./csvdb`.
    pub url: String,
}

impl DatabaseParams {
    /// Path to the SQLite file named by `url`.
    pub fn path(&self) -> Result<PathBuf> {
        let path = match self.url.find(":///") {
            Some(pos) if &self.url[..pos] == "sqlite" => &self.url[pos + 4..],
            Some(_) => bail!("Only sqlite database URLs are supported: {}", self.url),
            None => self.url.as_str(),
        };
        let path = path.trim_start_matches("./");
        if path.is_empty() {
            bail!("Database URL does not name a file: {}", self.url);
        }
        Ok(PathBuf::from(path))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnnotationParams {
    pub dir: PathBuf,
    pub database: PathBuf,
    pub ensembl_geneset: String,
    pub dbtable: String,
}

impl AnnotationParams {
    /// Path to the gzip-compressed gene set GTF.
    pub fn geneset(&self) -> PathBuf {
        self.dir.join(&self.ensembl_geneset)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenomeParams {
    pub dir: PathBuf,
    pub name: String,
}

impl GenomeParams {
    /// Path to the genome FASTA file.
    pub fn fasta(&self) -> PathBuf {
        self.dir.join(format!("{}.fa", self.name))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StarParams {
    pub index_dir: PathBuf,
    pub threads: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CgatMappingParams {
    pub enabled: bool,
    pub venv: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PicardParams {
    pub ref_flat: PathBuf,
    pub memory: String,
    pub threads: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SalmonParams {
    pub index: PathBuf,
    pub libtype: String,
    pub version: Option<String>,
    pub threads: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeeptoolsParams {
    pub norm_method: String,
    pub memory: String,
    pub threads: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SqlParams {
    /// Memory requested for large table loads.
    pub himem: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReportParams {
    pub path: Vec<PathBuf>,
}

/// The complete pipeline configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Params {
    /// Directory holding the input FASTQ files.
    pub input_dir: PathBuf,
    /// Directory for temporary files.
    pub tmp_dir: PathBuf,
    /// Library strandedness.
    #[serde(deserialize_with = "deserialize_strandedness")]
    pub strandedness: Strandedness,

    pub database: DatabaseParams,
    pub annotations: AnnotationParams,
    pub genome: GenomeParams,
    pub star: StarParams,
    pub cgat_mapping: CgatMappingParams,
    pub picard: PicardParams,
    pub salmon: SalmonParams,
    pub deeptools: DeeptoolsParams,
    pub sql: SqlParams,
    pub report: ReportParams,
}

/// Recursively overlay `overlay` onto `base`; mappings are merged key by key, everything else
/// is replaced.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn parse_yaml(text: &str, origin: &str) -> Result<Value> {
    let value: Value =
        serde_yaml::from_str(text).chain_err(|| format!("Could not parse YAML from {}", origin))?;
    match value {
        Value::Mapping(_) => Ok(value),
        // An empty file.
        Value::Null => Ok(Value::Mapping(Default::default())),
        _ => bail!("Configuration in {} is not a mapping", origin),
    }
}

impl Params {
    /// Build parameters from the default configuration overlaid with the given YAML documents.
    pub fn from_overlays(overlays: &[(&str, &str)]) -> Result<Self> {
        let mut value = parse_yaml(DEFAULT_CONFIG, "built-in defaults")?;
        for (origin, text) in overlays {
            merge(&mut value, parse_yaml(text, origin)?);
        }
        serde_yaml::from_value(value).chain_err(|| "Invalid pipeline configuration")
    }

    /// Load the configuration.
    ///
    /// Files in `optional` are read if they exist, in order; `explicit` must exist and is
    /// applied last.
    pub fn load(optional: &[PathBuf], explicit: Option<&Path>) -> Result<Self> {
        let mut paths: Vec<PathBuf> = optional.iter().filter(|p| p.is_file()).cloned().collect();
        if let Some(explicit) = explicit {
            if !explicit.is_file() {
                bail!("Configuration file {} does not exist", explicit.display());
            }
            paths.push(explicit.to_path_buf());
        }

        let mut texts = Vec::new();
        for path in &paths {
            let text = fs::read_to_string(path)
                .chain_err(|| format!("Could not read {}", path.display()))?;
            texts.push((path.display().to_string(), text));
        }
        let overlays: Vec<(&str, &str)> = texts
            .iter()
            .map(|(origin, text)| (origin.as_str(), text.as_str()))
            .collect();
        Self::from_overlays(&overlays)
    }
}

/// Configuration files looked up relative to the working directory, lowest priority first.
pub fn search_paths<P: AsRef<Path>>(workdir: P) -> Vec<PathBuf> {
    let workdir = workdir.as_ref();
    vec![workdir.join("..").join(CONFIG_FILE), workdir.join(CONFIG_FILE)]
}

/// Write the default configuration to `path`, refusing to overwrite an existing file.
pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        bail!("Refusing to overwrite existing {}", path.display());
    }
    fs::write(path, DEFAULT_CONFIG).chain_err(|| format!("Could not write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempdir::TempDir;

    #[test]
    fn test_defaults() {
        let params = Params::from_overlays(&[]).unwrap();
        assert_eq!(params.input_dir, PathBuf::from("data.dir"));
        assert_eq!(params.strandedness, Strandedness::Unstranded);
        assert_eq!(params.star.threads, 12);
        assert_eq!(params.salmon.version, None);
        assert!(params.report.path.is_empty());
        assert_eq!(params.database.path().unwrap(), PathBuf::from("csvdb"));
    }

    #[test]
    fn test_overlay_merges_sections() {
        let params = Params::from_overlays(&[
            ("a", "strandedness: RF\nsalmon:\n  libtype: ISR\n"),
            ("b", "salmon:\n  version: 1.4.0\n"),
        ])
        .unwrap();
        assert_eq!(params.strandedness, Strandedness::Reverse);
        assert_eq!(params.salmon.libtype, "ISR");
        assert_eq!(params.salmon.version, Some("1.4.0".to_string()));
        // Untouched keys of a merged section keep their defaults.
        assert_eq!(params.salmon.threads, 8);
    }

    #[test]
    fn test_strandedness_values() {
        for (text, expected) in &[
            ("R", Strandedness::Reverse),
            ("rf", Strandedness::Reverse),
            ("FR", Strandedness::Forward),
            ("fr", Strandedness::Forward),
            ("None", Strandedness::Unstranded),
            ("F", Strandedness::Forward),
            ("0", Strandedness::Unstranded),
            ("false", Strandedness::Unstranded),
            ("''", Strandedness::Unstranded),
        ] {
            let yaml = format!("strandedness: {}\n", text);
            let params = Params::from_overlays(&[("t", yaml.as_str())]).unwrap();
            assert_eq!(params.strandedness, *expected, "for {}", text);
        }
        assert!(Params::from_overlays(&[("t", "strandedness: XY\n")]).is_err());
        assert_eq!(Strandedness::Reverse.feature_counts_strand(), "2");
        assert_eq!(Strandedness::Forward.picard_strand(), "FIRST_READ_TRANSCRIPTION_STRAND");
        assert!(!Strandedness::Unstranded.is_stranded());
    }

    #[test]
    fn test_database_path() {
        let db = |url: &str| DatabaseParams {
            url: url.to_string(),
        };
        assert_eq!(db("sqlite:///./other.db").path().unwrap(), PathBuf::from("other.db"));
        assert_eq!(db("sqlite:////abs/csvdb").path().unwrap(), PathBuf::from("/abs/csvdb"));
        assert!(db("mysql:///csvdb").path().is_err());
        assert!(db("sqlite:///./").path().is_err());
    }

    #[test]
    fn test_load_and_write_default() {
        let tmp_dir = TempDir::new("mrnaseq_config").unwrap();
        let path = tmp_dir.path().join(CONFIG_FILE);
        write_default(&path).unwrap();
        assert!(write_default(&path).is_err());

        fs::write(&path, "genome:\n  name: mm10\n").unwrap();
        let params = Params::load(&search_paths(tmp_dir.path()), None).unwrap();
        assert_eq!(params.genome.name, "mm10");
        assert_eq!(params.genome.fasta(), PathBuf::from("mm10.fa"));

        let missing = tmp_dir.path().join("missing.yml");
        assert!(Params::load(&[], Some(missing.as_path())).is_err());
    }
}
