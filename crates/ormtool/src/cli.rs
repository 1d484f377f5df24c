use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ormtool",
    author,
    version,
    about = "Pack ambient occlusion, roughness and metallic maps into ORM textures"
)]
pub struct Cli {
    /// Configuration file; defaults to `ormtool.toml` in the user config directory.
    #[arg(long, global = true, value_name = "FILE", env = "ORMTOOL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack the three maps into Unreal (RGB) and/or Unity (RGBA) textures.
    Pack(PackArgs),
    /// Split an image into isolated red, green and blue grayscale previews.
    Channels(ChannelsArgs),
    /// Print the resolved configuration file and effective settings.
    Where,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Ambient occlusion map.
    #[arg(long, value_name = "IMAGE")]
    pub ao: PathBuf,

    /// Roughness map.
    #[arg(long, alias = "rough", value_name = "IMAGE")]
    pub roughness: PathBuf,

    /// Metallic map.
    #[arg(long, alias = "metal", value_name = "IMAGE")]
    pub metallic: PathBuf,

    /// Destination of the Unreal texture (R=AO, G=Roughness, B=Metallic).
    #[arg(long, value_name = "PATH")]
    pub unreal_out: Option<PathBuf>,

    /// Destination of the Unity texture (R=Metallic, G=AO, A=Smoothness).
    #[arg(long, value_name = "PATH")]
    pub unity_out: Option<PathBuf>,

    /// Skip the Unreal texture.
    #[arg(long)]
    pub no_unreal: bool,

    /// Skip the Unity texture.
    #[arg(long)]
    pub no_unity: bool,

    /// Print the result as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Do not draw the progress meter.
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct ChannelsArgs {
    /// RGB or RGBA image to split.
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Directory that receives `<stem>_r.png`, `<stem>_g.png` and `<stem>_b.png`.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_pack_with_aliases() {
        let cli = Cli::try_parse_from([
            "ormtool", "pack", "--ao", "a.png", "--rough", "r.png", "--metal", "m.png",
            "--no-unity",
        ])
        .expect("parse");
        match cli.command {
            Command::Pack(args) => {
                assert_eq!(args.roughness, PathBuf::from("r.png"));
                assert!(args.no_unity);
                assert!(!args.no_unreal);
                assert!(args.unreal_out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn pack_requires_all_three_maps() {
        assert!(Cli::try_parse_from(["ormtool", "pack", "--ao", "a.png"]).is_err());
    }
}
