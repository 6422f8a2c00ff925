#[cfg(not(feature = "bake_cli"))]
fn main() {
    eprintln!(
        "bake_cli requires `--features bake_cli`.\n\
         Example: cargo run --bin bake_cli --features bake_cli -- list"
    );
    std::process::exit(1);
}

#[cfg(feature = "bake_cli")]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(message) = native::run() {
        eprintln!("bake_cli: {message}");
        std::process::exit(2);
    }
}

#[cfg(feature = "bake_cli")]
mod native {
    use mesh_bake::bake::{
        EdgeCollapseReducer, LodRenderData, LodSettings, MeshGraph, Pipeline, PipelineSettings, ReductionSettings,
        lod_snapshot, primitives, write_obj,
    };
    use std::fs::{self, File};
    use std::io::{self, BufWriter, Write};
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"bake_cli (mesh-bake)

USAGE:
  bake_cli list
  bake_cli run <scenario|all> [options]

SCENARIOS:
  quad
  cube
  cylinder
  lod_chain

OPTIONS (run):
  --out-dir <dir>      Write <scenario>[_lodN].obj and .snap to this dir (required for `all`)
  --settings <file>    Pipeline settings as TOML, replacing the scenario defaults
  --overwrite          Overwrite existing output files
  -h, --help           Show this help

Without --out-dir the snapshot of every LOD is printed to stdout.
Set RUST_LOG=debug for per-stage logging.
"#;

    type ArgIter = std::iter::Skip<std::env::Args>;

    pub fn run() -> Result<(), String> {
        let mut args = std::env::args().skip(1);
        match args.next().as_deref() {
            None | Some("-h" | "--help" | "help") => {
                println!("{USAGE}");
                Ok(())
            }
            Some("list") => {
                for scenario in Scenario::ALL {
                    println!("{:<12} {}", scenario.name(), scenario.description());
                }
                Ok(())
            }
            Some("run") => {
                let target = args.next().ok_or("`run` needs a scenario name or `all`")?;
                match RunOptions::parse(args)? {
                    Some(options) => bake_scenarios(&target, &options),
                    None => {
                        println!("{USAGE}");
                        Ok(())
                    }
                }
            }
            Some(other) => Err(format!("no such command `{other}`\n\n{USAGE}")),
        }
    }

    #[derive(Default)]
    struct RunOptions {
        out_dir: Option<PathBuf>,
        settings: Option<PipelineSettings>,
        overwrite: bool,
    }

    impl RunOptions {
        /// `Ok(None)` when help was requested.
        fn parse(mut args: ArgIter) -> Result<Option<Self>, String> {
            let mut options = Self::default();
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "--out-dir" => options.out_dir = Some(PathBuf::from(flag_value(&mut args, &flag)?)),
                    "--settings" => {
                        let path = PathBuf::from(flag_value(&mut args, &flag)?);
                        options.settings = Some(load_settings(&path)?);
                    }
                    "--overwrite" => options.overwrite = true,
                    "-h" | "--help" => return Ok(None),
                    other => return Err(format!("unrecognized flag `{other}`\n\n{USAGE}")),
                }
            }
            Ok(Some(options))
        }
    }

    fn flag_value(args: &mut ArgIter, flag: &str) -> Result<String, String> {
        args.next().ok_or_else(|| format!("{flag} expects a value"))
    }

    fn bake_scenarios(target: &str, options: &RunOptions) -> Result<(), String> {
        let selected: Vec<Scenario> = match (target, options.out_dir.as_deref()) {
            ("all", None) => return Err("baking every scenario needs --out-dir".to_string()),
            ("all", Some(_)) => Scenario::ALL.to_vec(),
            (name, _) => vec![Scenario::from_name(name).ok_or_else(|| no_such_scenario(name))?],
        };

        if let Some(dir) = options.out_dir.as_deref() {
            fs::create_dir_all(dir).map_err(|e| format!("{}: {e}", dir.display()))?;
        }

        for scenario in selected {
            for output in run_scenario(scenario, options.settings.as_ref())? {
                if let Some(dir) = options.out_dir.as_deref() {
                    let snap = dir.join(format!("{}.snap", output.name));
                    save(&snap, options.overwrite, |w| w.write_all(lod_snapshot(&output.data).as_bytes()))?;
                    let obj = dir.join(format!("{}.obj", output.name));
                    save(&obj, options.overwrite, |w| write_obj(w, &output.name, &output.data))?;
                    eprintln!("{} -> {} + {}", output.name, snap.display(), obj.display());
                } else {
                    print!("{}", lod_snapshot(&output.data));
                }
                eprintln!("{}: {}", output.name, output.data.diagnostics);
            }
        }
        Ok(())
    }

    fn load_settings(path: &Path) -> Result<PipelineSettings, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
        PipelineSettings::from_toml_str(&text).map_err(|e| format!("{}: {e}", path.display()))
    }

    fn no_such_scenario(name: &str) -> String {
        let known: Vec<&str> = Scenario::ALL.iter().map(|s| s.name()).collect();
        format!("no such scenario `{name}` (known: {})", known.join(", "))
    }

    /// Creates `path` and hands a buffered writer to `write`. Existing files
    /// are kept unless `overwrite` is set.
    fn save(
        path: &Path,
        overwrite: bool,
        write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    ) -> Result<(), String> {
        if !overwrite && path.exists() {
            return Err(format!("{} already exists, pass --overwrite to replace it", path.display()));
        }
        let file = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer).and_then(|()| writer.flush()).map_err(|e| format!("{}: {e}", path.display()))
    }

    // ── scenarios ───────────────────────────────────────────────────────────

    struct BakedLod {
        name: String,
        data: LodRenderData,
    }

    #[derive(Debug, Clone, Copy)]
    enum Scenario {
        Quad,
        Cube,
        Cylinder,
        LodChain,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[Scenario::Quad, Scenario::Cube, Scenario::Cylinder, Scenario::LodChain];

        fn name(self) -> &'static str {
            match self {
                Scenario::Quad => "quad",
                Scenario::Cube => "cube",
                Scenario::Cylinder => "cylinder",
                Scenario::LodChain => "lod_chain",
            }
        }

        fn description(self) -> &'static str {
            match self {
                Scenario::Quad => "unit quad, one smoothing group",
                Scenario::Cube => "unit cube with every edge hard",
                Scenario::Cylinder => "capped 24-sided cylinder with lightmap UVs",
                Scenario::LodChain => "16x16 grid reduced through three chained LODs",
            }
        }

        fn from_name(name: &str) -> Option<Self> {
            Scenario::ALL.iter().copied().find(|s| s.name() == name)
        }

        fn mesh(self) -> Result<MeshGraph, String> {
            match self {
                Scenario::Quad => primitives::quad(),
                Scenario::Cube => primitives::unit_box(true),
                Scenario::Cylinder => primitives::cylinder(24, 0.5, 2.0),
                Scenario::LodChain => primitives::grid(16),
            }
            .map_err(|e| format!("{}: {e}", self.name()))
        }

        fn default_settings(self) -> PipelineSettings {
            let mut settings = PipelineSettings::default();
            match self {
                Scenario::Quad | Scenario::Cube => {}
                Scenario::Cylinder => {
                    settings.build = settings.build.with_lightmap_uvs(0, 1, 64);
                }
                Scenario::LodChain => {
                    let half = ReductionSettings::default().with_percent_triangles(0.5);
                    settings.lods = vec![
                        LodSettings::default(),
                        LodSettings::new(half.with_base_lod_model(Some(0))),
                        LodSettings::new(half.with_base_lod_model(Some(1))),
                    ];
                }
            }
            settings
        }
    }

    fn run_scenario(scenario: Scenario, settings: Option<&PipelineSettings>) -> Result<Vec<BakedLod>, String> {
        let mesh = scenario.mesh()?;
        let defaults = scenario.default_settings();
        let settings = settings.unwrap_or(&defaults);

        let results = Pipeline::build_all(std::slice::from_ref(&mesh), settings, &EdgeCollapseReducer::new());
        let single = results.len() == 1;
        results
            .into_iter()
            .enumerate()
            .map(|(lod, result)| {
                let data = result.map_err(|e| format!("{} LOD{lod}: {e}", scenario.name()))?;
                let name =
                    if single { scenario.name().to_string() } else { format!("{}_lod{lod}", scenario.name()) };
                Ok(BakedLod { name, data })
            })
            .collect()
    }
}
