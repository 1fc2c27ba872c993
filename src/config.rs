use crate::entities::pawn_list::{MAX_NPCS, MAX_PLAYERS};
use crate::world::instance::InstanceArea;
use crate::world::tile::Tile;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const WORLD_CONFIG_FILE: &str = "world.yml";

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub world_config: PathBuf,
    /// Stop after this many ticks; runs until shut down when unset.
    pub max_ticks: Option<u64>,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: tickworld <asset-root> [world-config] [max-ticks]".to_string());
        }

        let root = Path::new(&args[1]).to_path_buf();
        let world_config = if args.len() > 2 {
            PathBuf::from(&args[2])
        } else {
            env_value("TICKWORLD_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| root.join(WORLD_CONFIG_FILE))
        };
        let max_ticks = match args.get(3).cloned().or_else(|| env_value("TICKWORLD_MAX_TICKS")) {
            Some(value) => Some(
                value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid tick limit '{}'", value))?,
            ),
            None => None,
        };
        Ok(Self {
            root,
            world_config,
            max_ticks,
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Tunables of the simulation, read from `world.yml`. Missing keys keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub tick_length_ms: u64,
    /// Run path searches on worker threads instead of the tick thread.
    pub multi_threaded_path_finding: bool,
    pub path_workers: usize,
    pub max_players: usize,
    pub max_npcs: usize,
    pub player_lifepoints: i32,
    pub npc_lifepoints: i32,
    /// Where players without a death hook respawn.
    pub home_tile: Tile,
    pub event_logging: bool,
    /// YAML list of `{ region, key }` entries, relative to the asset root.
    pub xtea_file: String,
    /// Directory of `<region>.txt` key files, relative to the asset root.
    pub xtea_dir: String,
    pub xtea_cache_capacity: usize,
    pub instance_area: InstanceArea,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_length_ms: 600,
            multi_threaded_path_finding: false,
            path_workers: 2,
            max_players: MAX_PLAYERS,
            max_npcs: 4096,
            player_lifepoints: 10,
            npc_lifepoints: 10,
            home_tile: Tile::new(3222, 3218, 0),
            event_logging: true,
            xtea_file: "xteas.yml".to_string(),
            xtea_dir: "xteas".to_string(),
            xtea_cache_capacity: 256,
            instance_area: InstanceArea::default(),
        }
    }
}

impl WorldConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        Self::parse(&content).map_err(|err| format!("{}: {}", path.display(), err))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let mut config: WorldConfig =
            serde_yaml::from_str(content).map_err(|err| format!("invalid world config: {}", err))?;
        config.max_players = config.max_players.clamp(1, MAX_PLAYERS);
        config.max_npcs = config.max_npcs.clamp(1, MAX_NPCS);
        config.path_workers = config.path_workers.max(1);
        Ok(config)
    }

    pub fn tick_length(&self) -> Duration {
        Duration::from_millis(self.tick_length_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn root_is_required() {
        assert!(AppConfig::from_args(&args(&["tickworld"])).is_err());
    }

    #[test]
    fn positional_arguments_win() {
        let config = AppConfig::from_args(&args(&["tickworld", "/srv/world", "/etc/world.yml", "40"]))
            .expect("config");
        assert_eq!(config.root, PathBuf::from("/srv/world"));
        assert_eq!(config.world_config, PathBuf::from("/etc/world.yml"));
        assert_eq!(config.max_ticks, Some(40));
        assert!(AppConfig::from_args(&args(&["tickworld", "/srv", "w.yml", "soon"])).is_err());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = WorldConfig::parse(
            "tick_length_ms: 50\nmulti_threaded_path_finding: true\nhome_tile: { x: 100, z: 200, height: 1 }\nmax_players: 99999\n",
        )
        .expect("parse");
        assert_eq!(config.tick_length(), Duration::from_millis(50));
        assert!(config.multi_threaded_path_finding);
        assert_eq!(config.home_tile, Tile::new(100, 200, 1));
        assert_eq!(config.max_players, MAX_PLAYERS);
        assert_eq!(config.xtea_cache_capacity, 256);
        assert_eq!(config.instance_area, InstanceArea::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("tickworld-missing-{}.yml", std::process::id()));
        assert_eq!(WorldConfig::load(&path).expect("load"), WorldConfig::default());
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let err = WorldConfig::parse("tick_length_ms: [1, 2]\n").expect_err("invalid");
        assert!(err.contains("invalid world config"));
    }
}
