use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use henkan::converter::explain;
use henkan::dict::{build_dictionary, source, DictRow, DictionarySet};
use henkan::{utf16, Engine};

#[derive(Parser)]
#[command(name = "hentool", about = "Kana-to-kanji conversion diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a Mozc TSV corpus into the binary dictionary set
    Build {
        /// Directory containing dictionary*.txt source files
        corpus_dir: PathBuf,
        /// Path to connection_single_column.txt
        connection_file: PathBuf,
        /// Output directory for the compiled files
        out_dir: PathBuf,
    },

    /// Convert readings (one per line, stdin or a file) to ranked candidates
    Convert {
        /// Directory containing the compiled dictionary set
        dict_dir: PathBuf,
        /// Input file; stdin when omitted
        input_file: Option<PathBuf>,
        /// Number of candidates per reading
        #[arg(short, long, default_value = "3")]
        n: usize,
        /// Beam width for forward DP (0 = no pruning)
        #[arg(long, default_value = "20")]
        beam: usize,
        /// Output as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the lattice and N-best cost breakdown for a reading
    Explain {
        /// Directory containing the compiled dictionary set
        dict_dir: PathBuf,
        /// Kana reading to explain
        reading: String,
        /// Number of N-best paths to show
        #[arg(short, long, default_value = "5")]
        n: usize,
        /// Beam width for forward DP (0 = no pruning)
        #[arg(long, default_value = "20")]
        beam: usize,
        /// Filter to paths containing this surface
        #[arg(long)]
        surface: Option<String>,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Omit lattice arcs from the output
        #[arg(long)]
        no_lattice: bool,
    },

    /// Run readings from a file and record top-N surfaces to JSONL
    Snapshot {
        /// Directory containing the compiled dictionary set
        dict_dir: PathBuf,
        /// Input file (one reading per line)
        input_file: PathBuf,
        /// Output JSONL file
        output_file: PathBuf,
        /// Number of surfaces to record per reading
        #[arg(short, long, default_value = "5")]
        n: usize,
        /// Beam width for forward DP (0 = no pruning)
        #[arg(long, default_value = "20")]
        beam: usize,
    },

    /// Compare current output against a saved snapshot
    DiffSnapshot {
        /// Directory containing the compiled dictionary set
        dict_dir: PathBuf,
        /// Input file (one reading per line)
        input_file: PathBuf,
        /// Baseline JSONL file written by `snapshot`
        baseline_file: PathBuf,
        /// Number of surfaces to compare per reading
        #[arg(short, long, default_value = "5")]
        n: usize,
        /// Beam width for forward DP (0 = no pruning)
        #[arg(long, default_value = "20")]
        beam: usize,
    },

    /// Common-prefix search against the reading trie
    Cps {
        /// Directory containing the compiled dictionary set
        dict_dir: PathBuf,
        /// Reading to search
        reading: String,
    },

    /// Show the term id and posting list for a reading
    Termid {
        /// Directory containing the compiled dictionary set
        dict_dir: PathBuf,
        /// Reading to look up
        reading: String,
    },
}

/// One JSON output line of `convert --json`.
#[derive(Serialize)]
struct ConvertEntry {
    reading: String,
    candidates: Vec<CandidateEntry>,
    bunsetsu: Vec<usize>,
}

#[derive(Serialize)]
struct CandidateEntry {
    surface: String,
    score: i64,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    left_id: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    right_id: Option<i16>,
}

/// One JSONL line of `snapshot` / `diff-snapshot`.
#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    reading: String,
    surfaces: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            corpus_dir,
            connection_file,
            out_dir,
        } => build(&corpus_dir, &connection_file, &out_dir),
        Command::Convert {
            dict_dir,
            input_file,
            n,
            beam,
            json,
        } => convert(&dict_dir, input_file.as_deref(), n, beam, json),
        Command::Explain {
            dict_dir,
            reading,
            n,
            beam,
            surface,
            json,
            no_lattice,
        } => run_explain(&dict_dir, &reading, n, beam, surface.as_deref(), json, no_lattice),
        Command::Snapshot {
            dict_dir,
            input_file,
            output_file,
            n,
            beam,
        } => snapshot(&dict_dir, &input_file, &output_file, n, beam),
        Command::DiffSnapshot {
            dict_dir,
            input_file,
            baseline_file,
            n,
            beam,
        } => diff_snapshot(&dict_dir, &input_file, &baseline_file, n, beam),
        Command::Cps { dict_dir, reading } => cps(&dict_dir, &reading),
        Command::Termid { dict_dir, reading } => termid(&dict_dir, &reading),
    }
}

fn load_dict(dict_dir: &Path) -> Result<DictionarySet> {
    DictionarySet::load_dir(dict_dir)
        .with_context(|| format!("loading dictionary from {}", dict_dir.display()))
}

fn build(corpus_dir: &Path, connection_file: &Path, out_dir: &Path) -> Result<()> {
    let mut sources: Vec<PathBuf> = fs::read_dir(corpus_dir)
        .with_context(|| format!("reading {}", corpus_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("dictionary") && n.ends_with(".txt"))
        })
        .collect();
    sources.sort();
    if sources.is_empty() {
        bail!("no dictionary*.txt files in {}", corpus_dir.display());
    }

    let mut rows: Vec<DictRow> = Vec::new();
    for path in &sources {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let parsed = source::parse_mozc_tsv(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        eprintln!("loaded {} ({} rows)", path.display(), parsed.len());
        rows.extend(parsed);
    }

    let connection_text = fs::read_to_string(connection_file)
        .with_context(|| format!("reading {}", connection_file.display()))?;
    let connection = source::parse_connection_text(&connection_text)
        .with_context(|| format!("parsing {}", connection_file.display()))?;
    eprintln!("connection matrix dim={}", connection.dim());

    let dict = build_dictionary(rows, connection).context("building dictionary")?;
    dict.save_dir(out_dir)
        .with_context(|| format!("writing {}", out_dir.display()))?;
    eprintln!(
        "wrote {} ({} readings, {} tokens, {} POS pairs)",
        out_dir.display(),
        dict.reading.key_count(),
        dict.tokens.len(),
        dict.pos.len()
    );
    Ok(())
}

fn convert(
    dict_dir: &Path,
    input_file: Option<&Path>,
    n: usize,
    beam: usize,
    json: bool,
) -> Result<()> {
    let engine = Engine::load(dict_dir)
        .with_context(|| format!("loading dictionary from {}", dict_dir.display()))?;

    let reader: Box<dyn Read> = match input_file {
        Some(path) => {
            Box::new(fs::File::open(path).with_context(|| format!("opening {}", path.display()))?)
        }
        None => Box::new(std::io::stdin()),
    };
    let mut reader = BufReader::new(reader);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        while line.last().is_some_and(|&b| b == b'\n' || b == b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }

        // Malformed UTF-8 is reported per query and skipped.
        let Some(units) = utf16::decode_utf8(&line) else {
            eprintln!("skipping malformed UTF-8 input line");
            continue;
        };
        let reading = String::from_utf16_lossy(&units);
        let result = engine.convert_units(&units, n, beam);

        if json {
            let entry = ConvertEntry {
                reading,
                candidates: result
                    .candidates
                    .iter()
                    .map(|c| CandidateEntry {
                        surface: c.surface.clone(),
                        score: c.score,
                        kind: c.kind.code(),
                        left_id: c.pos_ids.map(|(l, _)| l),
                        right_id: c.pos_ids.map(|(_, r)| r),
                    })
                    .collect(),
                bunsetsu: result.bunsetsu_positions.clone(),
            };
            serde_json::to_writer(&mut out, &entry)?;
            writeln!(out)?;
        } else {
            writeln!(out, "# {reading}")?;
            for (rank, c) in result.candidates.iter().enumerate() {
                let lr = match c.pos_ids {
                    Some((l, r)) => format!("{l},{r}"),
                    None => "-".to_string(),
                };
                writeln!(
                    out,
                    "{}\t{}\tscore={}\ttype={}\tlr={}",
                    rank + 1,
                    c.surface,
                    c.score,
                    c.kind.code(),
                    lr
                )?;
            }
            if !result.bunsetsu_positions.is_empty() {
                let positions: Vec<String> = result
                    .bunsetsu_positions
                    .iter()
                    .map(|p| p.to_string())
                    .collect();
                writeln!(out, "bunsetsu: {}", positions.join(","))?;
            }
        }
    }
    Ok(())
}

fn run_explain(
    dict_dir: &Path,
    reading: &str,
    n: usize,
    beam: usize,
    surface: Option<&str>,
    json: bool,
    no_lattice: bool,
) -> Result<()> {
    let dict = load_dict(dict_dir)?;

    // Over-fetch when filtering by surface so the filter has something to
    // bite on.
    let fetch_n = if surface.is_some() { n.max(20) } else { n };
    let mut result = explain::explain_str(&dict, reading, fetch_n, beam);

    if let Some(filter) = surface {
        result.paths.retain(|p| p.surface().contains(filter));
        result.paths.truncate(n);
    }
    if no_lattice {
        result.lattice_nodes.clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", explain::format_text(&result));
    }
    Ok(())
}

/// Read a readings file: one per line, trimmed, `#` comments and blank
/// lines skipped.
fn read_readings(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(text
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect())
}

fn top_surfaces(engine: &Engine, reading: &str, n: usize, beam: usize) -> Vec<String> {
    engine
        .convert(reading, n, beam)
        .candidates
        .into_iter()
        .map(|c| c.surface)
        .collect()
}

fn snapshot(
    dict_dir: &Path,
    input_file: &Path,
    output_file: &Path,
    n: usize,
    beam: usize,
) -> Result<()> {
    let engine = Engine::load(dict_dir)
        .with_context(|| format!("loading dictionary from {}", dict_dir.display()))?;
    let readings = read_readings(input_file)?;

    let file = fs::File::create(output_file)
        .with_context(|| format!("creating {}", output_file.display()))?;
    let mut out = std::io::BufWriter::new(file);
    for reading in &readings {
        let entry = SnapshotEntry {
            reading: reading.clone(),
            surfaces: top_surfaces(&engine, reading, n, beam),
        };
        serde_json::to_writer(&mut out, &entry)?;
        writeln!(out)?;
    }
    eprintln!("wrote {} entries to {}", readings.len(), output_file.display());
    Ok(())
}

fn diff_snapshot(
    dict_dir: &Path,
    input_file: &Path,
    baseline_file: &Path,
    n: usize,
    beam: usize,
) -> Result<()> {
    let engine = Engine::load(dict_dir)
        .with_context(|| format!("loading dictionary from {}", dict_dir.display()))?;
    let readings = read_readings(input_file)?;

    let baseline_text = fs::read_to_string(baseline_file)
        .with_context(|| format!("reading {}", baseline_file.display()))?;
    let mut baseline: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for line in baseline_text.lines().filter(|l| !l.trim().is_empty()) {
        let entry: SnapshotEntry =
            serde_json::from_str(line).context("parsing baseline JSONL")?;
        baseline.insert(entry.reading, entry.surfaces);
    }

    let mut diffs = 0usize;
    for reading in &readings {
        let current = top_surfaces(&engine, reading, n, beam);
        match baseline.get(reading) {
            None => {
                diffs += 1;
                println!("? {reading}: not in baseline");
            }
            Some(expected) if *expected != current => {
                diffs += 1;
                println!("! {reading}");
                println!("  baseline: {}", expected.join(" / "));
                println!("  current:  {}", current.join(" / "));
            }
            Some(_) => {}
        }
    }

    if diffs > 0 {
        bail!("{diffs} of {} readings differ from baseline", readings.len());
    }
    println!("{} readings match baseline", readings.len());
    Ok(())
}

fn cps(dict_dir: &Path, reading: &str) -> Result<()> {
    let dict = load_dict(dict_dir)?;
    let units = utf16::encode(reading);
    for hit in dict.reading.common_prefix_search(&units) {
        println!("{}", String::from_utf16_lossy(&hit));
    }
    Ok(())
}

fn termid(dict_dir: &Path, reading: &str) -> Result<()> {
    let dict = load_dict(dict_dir)?;
    let units = utf16::encode(reading);
    let Some(term_id) = dict.reading.term_id(&units) else {
        bail!("reading {reading:?} is not in the dictionary");
    };
    println!("term_id: {term_id}");
    for token in dict.tokens.tokens_for(term_id as usize) {
        let (l, r) = dict.pos.get(token.pos_index);
        let surface = match token.node_index {
            henkan::dict::HIRAGANA_SENTINEL => reading.to_string(),
            henkan::dict::KATAKANA_SENTINEL => {
                String::from_utf16_lossy(&henkan::unicode::hiragana_to_katakana(&units))
            }
            node_index => {
                String::from_utf16_lossy(&dict.surface.label_of_node(node_index as usize))
            }
        };
        println!(
            "{surface}\tcost={}\tlr={l},{r}\tnode={}",
            token.word_cost, token.node_index
        );
    }
    Ok(())
}
