macro_rules! cfg_tracing {
    ($($body:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            $($body)*
        }
    };
}
