mod commandline;
mod defaults;
mod file;
mod primitives;

use clap::Parser;

use commandline::{Args, Output};
use defaults::Defaults;

pub(crate) use file::{ConfigFile as Configuration, Tracing};
pub(crate) use primitives::LogFormat;

pub(crate) fn configure() -> color_eyre::Result<Configuration> {
    let Output {
        config_format,
        config_file,
        save_to,
    } = Args::parse().into_output();

    let config = config::Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(
            config::Environment::with_prefix("ROUNDEL")
                .separator("__")
                .try_parsing(true),
        )
        .add_source(config::Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(config)
}

/// The default configuration with nothing merged over it. Used by tests
/// that need a [`Configuration`] without parsing a commandline.
#[cfg(test)]
pub(crate) fn defaults() -> Configuration {
    config::Config::builder()
        .add_source(config::Config::try_from(&Defaults::default()).expect("serializable defaults"))
        .build()
        .expect("buildable defaults")
        .try_deserialize()
        .expect("deserializable defaults")
}
