fn main() {
    // Ensure a protoc compiler is available even when one is not installed
    // system-wide by falling back to the vendored binary. This only affects
    // where the build finds protoc; the generated code is unchanged.
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(protoc) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", protoc);
        }
    }

    #[allow(clippy::expect_used)]
    tonic_build::compile_protos("protos/delivery.proto")
        .expect("Failed to compile `delivery.proto` file");
}
