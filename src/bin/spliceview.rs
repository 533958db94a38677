use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{Level, error, info};
use simple_logger::init_with_level;
use spliceview::{
    about,
    expression::{Condition, ExpressionProject, Project},
    force_graph::{GraphData, Invalidation},
    gene_models::GeneCatalog,
    render_gene::export_gene_svg,
    render_graph::export_graph_svg,
    report::classify_catalog,
    rmats::{kind_from_path, read_3drnaseq_de_table, read_3drnaseq_table, read_rmats_table},
    settings::{GraphSettings, PlotSettings, TABLEAU10},
    splicing::EventKind,
};
use std::{
    fs::{self, File},
    io::BufReader,
    path::Path,
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(
    name = "spliceview",
    version = about::SPLICEVIEW_DISPLAY_VERSION,
    about = "Gene-structure and alternative-splicing diagrams",
    long_about = None
)]
struct Cli {
    #[arg(short, long, global = true, help = "Log debug messages")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ExpressionArgs {
    #[arg(long, help = "Control TPM table (id, tpm, count, level columns)")]
    control: Option<String>,

    #[arg(long, help = "Treatment TPM table (id, tpm, count, level columns)")]
    treatment: Option<String>,

    #[arg(long, default_value = TABLEAU10[0])]
    control_color: String,

    #[arg(long, default_value = TABLEAU10[1])]
    treatment_color: String,
}

impl ExpressionArgs {
    fn load(&self) -> Result<Option<Project>> {
        let (control, treatment) = match (&self.control, &self.treatment) {
            (None, None) => return Ok(None),
            (Some(c), Some(t)) => (c, t),
            _ => bail!("--control and --treatment must be given together"),
        };
        let read = |path: &str, name: &str, color: &str| -> Result<Condition> {
            let file = open_input(path, "TPM table")?;
            Condition::from_tsv(name, color, file)
                .with_context(|| format!("Could not read TPM table '{path}'"))
        };
        Ok(Some(Project::new(
            read(control.as_str(), "control", &self.control_color)?,
            read(treatment.as_str(), "treatment", &self.treatment_color)?,
        )))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Builds a gene catalog from the exon and CDS lines of a GTF file
    ImportGtf {
        #[arg(short, long)]
        gtf: String,
        #[arg(short, long)]
        output: String,
    },

    /// Attaches splicing events to a catalog and reports consistent isoform pairs
    Classify {
        #[arg(short, long, help = "Gene catalog JSON")]
        genes: String,
        #[arg(long, help = "rMATS table; the event type is taken from the file name")]
        rmats: Vec<String>,
        #[arg(long, help = "Event type for all rMATS tables (RI, SE, A3SS, A5SS)")]
        event_type: Option<EventKind>,
        #[arg(long, help = "3D RNA-seq DAS gene table")]
        das: Vec<String>,
        #[arg(long, help = "3D RNA-seq DE gene table (target, log2FC, adj.pval)")]
        de: Vec<String>,
        #[command(flatten)]
        expression: ExpressionArgs,
        #[arg(short, long, help = "Report path; stdout when omitted")]
        output: Option<String>,
        #[arg(long, help = "Write the catalog with attached events here")]
        save: Option<String>,
    },

    /// Draws one gene with its isoforms and events as SVG
    RenderGene {
        #[arg(short, long)]
        genes: String,
        #[arg(long, help = "Gene id or name")]
        gene: String,
        #[arg(long, help = "Plot settings JSON")]
        settings: Option<String>,
        #[command(flatten)]
        expression: ExpressionArgs,
        #[arg(short, long)]
        output: String,
    },

    /// Lays out a node/link graph and draws it as SVG
    RenderGraph {
        #[arg(long, help = "Graph JSON, inline or @file; a demo graph when omitted")]
        data: Option<String>,
        #[arg(long, help = "Graph settings JSON")]
        settings: Option<String>,
        #[arg(long, help = "Layout time budget in milliseconds")]
        timeout_ms: Option<u64>,
        #[arg(short, long)]
        output: String,
    },

    /// Prints version and build number
    Version,
}

fn open_input(path: &str, what: &str) -> Result<File> {
    File::open(path).with_context(|| format!("Could not open {what} '{path}'"))
}

fn load_json_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Could not read JSON file '{path}'"))
        }
        None => Ok(value.to_string()),
    }
}

fn load_catalog(path: &str) -> Result<GeneCatalog> {
    GeneCatalog::load_from_path(path)
        .with_context(|| format!("Could not load gene catalog '{path}'"))
}

fn write_output(path: &str, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("Could not write '{path}'"))?;
    info!("Wrote {path}");
    Ok(())
}

fn import_gtf(gtf: &str, output: &str) -> Result<()> {
    let file = open_input(gtf, "GTF")?;
    let catalog = GeneCatalog::from_gtf(BufReader::new(file))
        .with_context(|| format!("Could not import '{gtf}'"))?;
    catalog
        .save_to_path(output)
        .with_context(|| format!("Could not write catalog '{output}'"))?;
    info!("Imported {} genes into {output}", catalog.genes.len());
    Ok(())
}

struct ClassifyInputs<'a> {
    rmats: &'a [String],
    event_type: Option<EventKind>,
    das: &'a [String],
    de: &'a [String],
}

fn classify(
    genes: &str,
    inputs: ClassifyInputs<'_>,
    expression: &ExpressionArgs,
    output: Option<&str>,
    save: Option<&str>,
) -> Result<()> {
    let ClassifyInputs {
        rmats,
        event_type,
        das,
        de,
    } = inputs;
    let mut catalog = load_catalog(genes)?;
    let project = expression.load()?;

    for path in rmats {
        let kind = match event_type.or_else(|| kind_from_path(Path::new(path))) {
            Some(kind) => kind,
            None => bail!("Could not tell the event type of '{path}'; pass --event-type"),
        };
        let file = open_input(path, "rMATS table")?;
        let records =
            read_rmats_table(file, kind).with_context(|| format!("Could not read '{path}'"))?;
        let attached = catalog.attach_events(records);
        info!("Attached {attached} {kind} events from {path}");
    }
    for path in das {
        let file = open_input(path, "DAS table")?;
        let records =
            read_3drnaseq_table(file).with_context(|| format!("Could not read '{path}'"))?;
        let attached = catalog.attach_events(records);
        info!("Attached {attached} 3D RNA-seq events from {path}");
    }
    for path in de {
        let file = open_input(path, "DE table")?;
        let records =
            read_3drnaseq_de_table(file).with_context(|| format!("Could not read '{path}'"))?;
        let attached = catalog.attach_differential_expression(records);
        info!("Attached differential expression of {attached} genes from {path}");
    }

    let reports = classify_catalog(&catalog, project.as_ref());
    info!("Classified events of {} genes", reports.len());
    let text = serde_json::to_string_pretty(&reports).context("Could not serialize report")?;
    match output {
        Some(path) => write_output(path, &text)?,
        None => println!("{text}"),
    }
    if let Some(path) = save {
        catalog
            .save_to_path(path)
            .with_context(|| format!("Could not write catalog '{path}'"))?;
    }
    Ok(())
}

fn render_gene(
    genes: &str,
    gene_id: &str,
    settings: Option<&str>,
    expression: &ExpressionArgs,
    output: &str,
) -> Result<()> {
    let catalog = load_catalog(genes)?;
    let Some(gene) = catalog.gene(gene_id) else {
        bail!("No gene '{gene_id}' in '{genes}'");
    };
    let settings = match settings {
        Some(path) => PlotSettings::load_from_path(path)
            .with_context(|| format!("Could not load settings '{path}'"))?,
        None => PlotSettings::default(),
    };
    let project = expression.load()?;
    let project = project.as_ref().map(|p| p as &dyn ExpressionProject);
    let svg = export_gene_svg(gene, project, &settings);
    write_output(output, &svg)
}

fn render_graph(
    data: Option<&str>,
    settings: Option<&str>,
    timeout_ms: Option<u64>,
    output: &str,
) -> Result<()> {
    let data = match data {
        Some(arg) => {
            serde_json::from_str(&load_json_arg(arg)?).context("Could not parse graph JSON")?
        }
        None => GraphData::default(),
    };
    let settings = match settings {
        Some(path) => GraphSettings::load_from_path(path)
            .with_context(|| format!("Could not load settings '{path}'"))?,
        None => GraphSettings::default(),
    };
    let timeout = timeout_ms.unwrap_or(settings.timeout_ms);
    let invalidation = if timeout == 0 {
        Invalidation::new()
    } else {
        Invalidation::with_timeout(Duration::from_millis(timeout))
    };
    let svg = export_graph_svg(&data, &settings, &invalidation)?;
    write_output(output, &svg)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::ImportGtf { gtf, output } => import_gtf(&gtf, &output),
        Command::Classify {
            genes,
            rmats,
            event_type,
            das,
            de,
            expression,
            output,
            save,
        } => classify(
            &genes,
            ClassifyInputs {
                rmats: &rmats,
                event_type,
                das: &das,
                de: &de,
            },
            &expression,
            output.as_deref(),
            save.as_deref(),
        ),
        Command::RenderGene {
            genes,
            gene,
            settings,
            expression,
            output,
        } => render_gene(&genes, &gene, settings.as_deref(), &expression, &output),
        Command::RenderGraph {
            data,
            settings,
            timeout_ms,
            output,
        } => render_graph(data.as_deref(), settings.as_deref(), timeout_ms, &output),
        Command::Version => {
            println!("{}", about::version_cli_text());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::Debug } else { Level::Info };
    if let Err(e) = init_with_level(level) {
        eprintln!("Could not set up logging: {e}");
    }
    if let Err(e) = run(cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
