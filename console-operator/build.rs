use console_types::{Console, ConsoleAuthorisation, ConsoleTemplate, DirectoryRoleBinding};
use kube::CustomResourceExt;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/console.example.io_consoles.yaml",
        serde_yaml::to_string(&Console::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "../crds/console.example.io_consoletemplates.yaml",
        serde_yaml::to_string(&ConsoleTemplate::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "../crds/console.example.io_consoleauthorisations.yaml",
        serde_yaml::to_string(&ConsoleAuthorisation::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "../crds/console.example.io_directoryrolebindings.yaml",
        serde_yaml::to_string(&DirectoryRoleBinding::crd()).unwrap(),
    )
    .unwrap();
}
