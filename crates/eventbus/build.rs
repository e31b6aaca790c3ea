fn main() {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path().unwrap());
    }
    prost_build::Config::new()
        .compile_protos(&["proto/snapshot.proto"], &["proto/"])
        .expect("snapshot.proto compiles");
}
