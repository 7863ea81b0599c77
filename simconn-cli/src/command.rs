use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "simconn", version, about = "Simulator connector with a timed license lease")]
pub enum ConnectorCommand {
    /// Run simulation routines, holding the license only while they are busy
    Run {
        /// number of routine runs
        #[arg(long, default_value_t = 8)]
        runs: usize,

        /// routine runs allowed at the same time
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// idle time before the license is released
        #[arg(long, default_value_t = 500)]
        lock_time_ms: u64,

        /// time each routine keeps the license busy
        #[arg(long, default_value_t = 100)]
        work_ms: u64,

        /// latency of the simulated license server
        #[arg(long, default_value_t = 50)]
        seat_delay_ms: u64,

        /// idle pause halfway through the runs
        #[arg(long)]
        pause_ms: Option<u64>,

        /// model file opened before the runs
        #[arg(long)]
        model: String,
    },
    /// Run one heat exchanger simulation and print its outputs
    Simulate {
        /// inlet temperature (C)
        #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
        inlet_temp: f64,

        /// flow rate (kg/s)
        #[arg(long, default_value_t = 1.0)]
        flow_rate: f64,

        /// specific heat capacity (J/kg K)
        #[arg(long, default_value_t = 4186.0)]
        heat_capacity: f64,

        /// heat transfer rate (W)
        #[arg(long, default_value_t = 10000.0, allow_negative_numbers = true)]
        heat_transfer: f64,
    },
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::ConnectorCommand;

    #[test]
    fn run_defaults() {
        assert!(ConnectorCommand::try_parse_from(["simconn", "run"]).is_err());

        let cmd =
            ConnectorCommand::try_parse_from(["simconn", "run", "--model", "exchanger.xml"])
                .unwrap();
        let ConnectorCommand::Run {
            runs,
            concurrency,
            lock_time_ms,
            pause_ms,
            model,
            ..
        } = &cmd
        else {
            panic!("expected run, got {:?}", cmd);
        };
        assert_eq!("exchanger.xml", model);
        assert_eq!(8, *runs);
        assert_eq!(4, *concurrency);
        assert_eq!(500, *lock_time_ms);
        assert_eq!(None, *pause_ms);
    }

    #[test]
    fn simulate_args() {
        let cmd = ConnectorCommand::try_parse_from([
            "simconn",
            "simulate",
            "--inlet-temp",
            "30",
            "--heat-transfer",
            "-500",
        ])
        .unwrap();
        let ConnectorCommand::Simulate {
            inlet_temp,
            heat_transfer,
            ..
        } = &cmd
        else {
            panic!("expected simulate, got {:?}", cmd);
        };
        assert_eq!(30.0, *inlet_temp);
        assert_eq!(-500.0, *heat_transfer);
    }

    #[test]
    fn simulate_negative_inlet() {
        let cmd =
            ConnectorCommand::try_parse_from(["simconn", "simulate", "--inlet-temp", "-5"])
                .unwrap();
        let ConnectorCommand::Simulate { inlet_temp, .. } = &cmd else {
            panic!("expected simulate, got {:?}", cmd);
        };
        assert_eq!(-5.0, *inlet_temp);
    }

    #[test]
    fn unknown_subcommand() {
        assert!(ConnectorCommand::try_parse_from(["simconn", "lease"]).is_err());
    }
}
