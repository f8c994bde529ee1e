fn main() {
    noponto_lib::run()
}
