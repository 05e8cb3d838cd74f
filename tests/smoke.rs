use smiv::network::{NetworkBuilder, NetworkSpec};
use smiv::simulator::config::{apply_cli_overrides, load_config, validate_config};
use smiv::simulator::utils::log::init_log;
use smiv::simulator::Simulator;
use smiv::{RunMode, SimConfig};
use std::path::PathBuf;

fn network_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("networks").join(name)
}

fn run(name: &str, graph: bool) -> Vec<f32> {
  let path = network_path(name);
  let mut app = load_config(None).unwrap();
  apply_cli_overrides(&mut app, true, false, None, graph, path.to_str(), None);
  validate_config(&app).unwrap();
  let config = SimConfig::from_app_config(&app).unwrap();
  assert_eq!(config.run_mode == RunMode::Graph, graph);

  let builder = NetworkBuilder::new(NetworkSpec::from_file(&path).unwrap()).weight_init(config.weight_init);
  let mut simulator = Simulator::new(config, builder.build().unwrap(), builder.sample_input()).unwrap();
  simulator.run().unwrap();
  simulator.output().unwrap().to_dense()
}

macro_rules! smoke_case {
  ($name:ident, $file:literal) => {
    #[test]
    #[cfg(feature = "smoke-tests")]
    fn $name() {
      init_log();
      let layers = run($file, false);
      let graph = run($file, true);
      assert!(!layers.is_empty());
      assert!(layers.iter().all(|v| v.is_finite()));
      assert_eq!(layers, graph);
    }
  };
}

smoke_case!(small_cnn, "small_cnn.toml");
smoke_case!(strided, "strided.toml");
