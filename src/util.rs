use {
    anyhow::Result,
    serde::{
        de::DeserializeOwned,
        Serialize,
    },
    std::{
        fs::File,
        io::Write,
        path::Path,
        time::Duration,
    },
};


pub fn read_config<C, P>(path: P) -> Result<C>
where
    C: DeserializeOwned,
    P: AsRef<Path>,
{
    let contents = std::fs::read_to_string(path)?;
    Ok(ron::from_str(&contents)?)
}

pub fn write_config<C, P>(
    config: &C,
    path: P,
) -> Result<()>
where
    C: Serialize + ?Sized,
    P: AsRef<Path>,
{
    File::create(path)?.write_all(
        ron::ser::to_string_pretty(
            config,
            ron::ser::PrettyConfig::default(),
        )?.as_bytes()
    )?;
    Ok(())
}

/// Wall-clock time as `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}


#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::configs::SAC_Config,
        tempdir::TempDir,
    };

    #[test]
    fn elapsed_is_zero_padded() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_millis(3_725_900)), "01:02:05");
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn configs_survive_a_file() -> Result<()> {
        let dir = TempDir::new("sac_config")?;
        let path = dir.path().join("config.ron");
        let config = SAC_Config::cartpole();
        write_config(&config, &path)?;
        assert_eq!(read_config::<SAC_Config, _>(&path)?, config);
        Ok(())
    }
}
