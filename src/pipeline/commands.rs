//! Command lines for each tool stage.
//!
//! These only assemble arguments; nothing is resolved or executed here.

use std::path::{Path, PathBuf};

use crate::process::Cmd;
use crate::workspace::Workspace;

pub const SIGNATURE_ALGORITHM: &str = "MD5withRSA";
pub const DIGEST_ALGORITHM: &str = "SHA1";
pub const ALIGNMENT: &str = "4";

/// Credentials handed to jarsigner.
#[derive(Debug, Clone, Copy)]
pub struct Signing<'a> {
    pub keystore: &'a Path,
    pub store_password: &'a str,
    pub key_password: &'a str,
    pub alias: &'a str,
}

/// `aapt package -m -J <generated-sources> -M <manifest> -S <res> -I <jar>`
pub fn resource_compile(aapt: &Path, workspace: &Workspace, platform_jar: &Path) -> Cmd {
    Cmd::new(aapt)
        .args(["package", "-m", "-J"])
        .arg_path(&workspace.generated_sources_dir())
        .arg("-M")
        .arg_path(&workspace.manifest())
        .arg("-S")
        .arg_path(&workspace.res_dir())
        .arg("-I")
        .arg_path(platform_jar)
        .dir(workspace.root())
}

/// `javac -source <level> -target <level> -classpath <jar> -d <classes> -s <sources> <files...>`
pub fn source_compile<I>(
    javac: &Path,
    java_level: &str,
    platform_jar: &Path,
    workspace: &Workspace,
    sources: I,
) -> Cmd
where
    I: IntoIterator<Item = PathBuf>,
{
    Cmd::new(javac)
        .arg("-source")
        .arg(java_level)
        .arg("-target")
        .arg(java_level)
        .arg("-classpath")
        .arg_path(platform_jar)
        .arg("-d")
        .arg_path(&workspace.generated_classes_dir())
        .arg("-s")
        .arg_path(&workspace.generated_sources_dir())
        .args(sources)
        .dir(workspace.root())
}

/// `dx --dex --output=<classes.dex> <class> <generated-classes>`
pub fn dex_compile(dx: &Path, workspace: &Workspace) -> Cmd {
    let mut output = std::ffi::OsString::from("--output=");
    output.push(workspace.dex_file());
    Cmd::new(dx)
        .arg("--dex")
        .arg(output)
        .arg_path(&workspace.class_dir())
        .arg_path(&workspace.generated_classes_dir())
        .dir(workspace.root())
}

/// `aapt package -f -M <manifest> -S <res> [-A <asset>] -I <jar> -F <output>`
pub fn package(
    aapt: &Path,
    workspace: &Workspace,
    platform_jar: &Path,
    output: &Path,
    include_assets: bool,
) -> Cmd {
    let mut cmd = Cmd::new(aapt)
        .args(["package", "-f", "-M"])
        .arg_path(&workspace.manifest())
        .arg("-S")
        .arg_path(&workspace.res_dir());
    if include_assets {
        cmd = cmd.arg("-A").arg_path(&workspace.asset_dir());
    }
    cmd.arg("-I")
        .arg_path(platform_jar)
        .arg("-F")
        .arg_path(output)
        .dir(workspace.root())
}

/// `jarsigner -storepass **** -keystore <ks> -keypass **** -sigalg MD5withRSA -digestalg SHA1 <apk> <alias>`
pub fn sign(jarsigner: &Path, signing: &Signing<'_>, apk: &Path) -> Cmd {
    Cmd::new(jarsigner)
        .arg("-storepass")
        .secret_arg(signing.store_password)
        .arg("-keystore")
        .arg_path(signing.keystore)
        .arg("-keypass")
        .secret_arg(signing.key_password)
        .arg("-sigalg")
        .arg(SIGNATURE_ALGORITHM)
        .arg("-digestalg")
        .arg(DIGEST_ALGORITHM)
        .arg_path(apk)
        .arg(signing.alias)
}

/// `zipalign 4 <input> <output>`
pub fn align(zipalign: &Path, input: &Path, output: &Path) -> Cmd {
    Cmd::new(zipalign)
        .arg(ALIGNMENT)
        .arg_path(input)
        .arg_path(output)
}
